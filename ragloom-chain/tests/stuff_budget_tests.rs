//! Property tests for stuff-mode prompt packing.

mod common;

use std::sync::Arc;

use common::{ScriptedModel, orchestrator, retrieval};
use proptest::prelude::*;
use ragloom_chain::{ChainError, ChainStrategy, CharCount, CostFunction};
use ragloom_rag::Query;

/// **Stuff budget**
/// *For any* retrieved chunks and budget, a stuff chain SHALL never dispatch
/// a prompt costing more than the budget, SHALL keep a prefix of the
/// retrieval order, and SHALL report every other chunk as dropped.
mod prop_stuff_budget {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn dispatched_prompt_never_exceeds_budget(
            texts in proptest::collection::vec("[a-z ]{1,80}", 1..8),
            budget in 1usize..400,
        ) {
            let ids: Vec<String> = (0..texts.len()).map(|i| format!("doc#{:08}", i * 100)).collect();
            let pairs: Vec<(&str, &str)> = ids.iter().map(String::as_str).zip(texts.iter().map(String::as_str)).collect();
            let retrieved = retrieval(&pairs);

            let model = Arc::new(ScriptedModel::new(vec![]));
            let chain = orchestrator(model.clone(), 10_000, ChainStrategy::Stuff { budget: Some(budget) });

            let rt = tokio::runtime::Runtime::new().unwrap();
            let outcome = rt.block_on(chain.execute(&retrieved, &Query::new("question?", pairs.len())));

            match outcome {
                Ok(result) => {
                    let prompts = model.prompts();
                    prop_assert_eq!(prompts.len(), 1);
                    prop_assert!(CharCount.cost(&prompts[0]) <= budget);

                    let kept = ids.len() - result.dropped.len();
                    prop_assert!(kept >= 1);
                    let cited: Vec<String> = result.citations.iter().cloned().collect();
                    prop_assert_eq!(&cited[..], &ids[..kept]);
                    prop_assert_eq!(&result.dropped[..], &ids[kept..]);
                }
                Err(ChainError::BudgetError { cost, limit, .. }) => {
                    prop_assert_eq!(model.calls(), 0);
                    prop_assert_eq!(limit, budget);
                    prop_assert!(cost > budget);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
