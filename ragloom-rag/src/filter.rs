//! Metadata predicates for hybrid (vector + metadata) search.

use serde::{Deserialize, Serialize};

use crate::document::{Metadata, MetadataValue};

/// A predicate over chunk metadata.
///
/// A key that is absent from the metadata never satisfies `Eq`, `In` or
/// `Range`; it does satisfy `Ne`.
///
/// # Example
///
/// ```rust,ignore
/// use ragloom_rag::MetadataFilter;
///
/// let filter = MetadataFilter::eq("lang", "en").and(MetadataFilter::range("year", Some(2020.0), None));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetadataFilter {
    /// `metadata[key] == value`.
    Eq { key: String, value: MetadataValue },
    /// `metadata[key] != value`, or the key is absent.
    Ne { key: String, value: MetadataValue },
    /// `metadata[key]` is one of `values`.
    In { key: String, values: Vec<MetadataValue> },
    /// The key is present.
    Exists { key: String },
    /// Numeric value within the inclusive bounds. Non-numeric values do not match.
    Range { key: String, min: Option<f64>, max: Option<f64> },
    /// All sub-filters match.
    And { filters: Vec<MetadataFilter> },
    /// At least one sub-filter matches.
    Or { filters: Vec<MetadataFilter> },
    /// The sub-filter does not match.
    Not { filter: Box<MetadataFilter> },
}

impl MetadataFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::Eq { key: key.into(), value: value.into() }
    }

    pub fn ne(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::Ne { key: key.into(), value: value.into() }
    }

    pub fn any_of<V: Into<MetadataValue>>(
        key: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In { key: key.into(), values: values.into_iter().map(Into::into).collect() }
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Self::Exists { key: key.into() }
    }

    pub fn range(key: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::Range { key: key.into(), min, max }
    }

    /// Combine with another filter; both must match.
    pub fn and(self, other: MetadataFilter) -> Self {
        match self {
            Self::And { mut filters } => {
                filters.push(other);
                Self::And { filters }
            }
            first => Self::And { filters: vec![first, other] },
        }
    }

    /// Combine with another filter; either may match.
    pub fn or(self, other: MetadataFilter) -> Self {
        match self {
            Self::Or { mut filters } => {
                filters.push(other);
                Self::Or { filters }
            }
            first => Self::Or { filters: vec![first, other] },
        }
    }

    /// Negate this filter.
    pub fn negate(self) -> Self {
        Self::Not { filter: Box::new(self) }
    }

    /// Evaluate the predicate against a metadata map.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { key, value } => metadata.get(key).is_some_and(|v| values_equal(v, value)),
            Self::Ne { key, value } => !metadata.get(key).is_some_and(|v| values_equal(v, value)),
            Self::In { key, values } => metadata
                .get(key)
                .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate))),
            Self::Exists { key } => metadata.contains_key(key),
            Self::Range { key, min, max } => {
                let Some(n) = metadata.get(key).and_then(MetadataValue::as_f64) else {
                    return false;
                };
                min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)
            }
            Self::And { filters } => filters.iter().all(|f| f.matches(metadata)),
            Self::Or { filters } => filters.iter().any(|f| f.matches(metadata)),
            Self::Not { filter } => !filter.matches(metadata),
        }
    }
}

/// Integers and floats compare numerically; everything else compares structurally.
fn values_equal(a: &MetadataValue, b: &MetadataValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Metadata {
        Metadata::from([
            ("lang".to_string(), MetadataValue::from("en")),
            ("year".to_string(), MetadataValue::from(2021_i64)),
            ("draft".to_string(), MetadataValue::from(false)),
        ])
    }

    #[test]
    fn eq_and_missing_keys() {
        let m = metadata();
        assert!(MetadataFilter::eq("lang", "en").matches(&m));
        assert!(!MetadataFilter::eq("lang", "de").matches(&m));
        assert!(!MetadataFilter::eq("author", "x").matches(&m));
        assert!(MetadataFilter::ne("author", "x").matches(&m));
    }

    #[test]
    fn numeric_comparisons_cross_integer_and_float() {
        let m = metadata();
        assert!(MetadataFilter::eq("year", 2021.0).matches(&m));
        assert!(MetadataFilter::range("year", Some(2020.0), Some(2021.0)).matches(&m));
        assert!(!MetadataFilter::range("year", Some(2022.0), None).matches(&m));
        assert!(!MetadataFilter::range("lang", None, None).matches(&m));
    }

    #[test]
    fn combinators() {
        let m = metadata();
        let f = MetadataFilter::eq("lang", "en").and(MetadataFilter::eq("draft", false));
        assert!(f.matches(&m));
        let g = MetadataFilter::eq("lang", "fr").or(MetadataFilter::any_of("year", [2020_i64, 2021]));
        assert!(g.matches(&m));
        assert!(!g.negate().matches(&m));
        assert!(MetadataFilter::exists("draft").matches(&m));
    }

    #[test]
    fn serializes_with_op_tag() {
        let f = MetadataFilter::eq("lang", "en");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["op"], "eq");
        let back: MetadataFilter = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);
    }
}
