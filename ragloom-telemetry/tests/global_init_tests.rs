//! Global subscriber installation. Kept in its own test binary because the
//! global subscriber can only be set once per process.

use ragloom_telemetry::{LogFormat, SpanCapture, TelemetryConfig, init_telemetry, init_with_capture};

#[tokio::test]
async fn capture_sees_events_from_spawned_tasks_and_second_init_fails() {
    let capture = SpanCapture::new();
    let config = TelemetryConfig {
        default_directive: "debug".into(),
        format: LogFormat::Compact,
        with_target: false,
    };
    init_with_capture(config, capture.clone()).unwrap();

    tokio::spawn(async {
        let span = tracing::info_span!("task.run", worker = 1u64);
        let _guard = span.enter();
        tracing::debug!(state = "working");
    })
    .await
    .unwrap();

    assert_eq!(capture.spans_named("task.run").len(), 1);
    assert_eq!(capture.events_in("task.run")[0].str_field("state"), Some("working"));

    assert!(init_telemetry(TelemetryConfig::default()).is_err());
}
