//! # ragloom-telemetry
//!
//! Tracing setup for ragloom binaries and an in-memory capture layer for
//! tests.
//!
//! ```rust,ignore
//! use ragloom_telemetry::{TelemetryConfig, LogFormat, init_telemetry};
//!
//! init_telemetry(TelemetryConfig { format: LogFormat::Json, ..Default::default() })?;
//! ```
//!
//! `RUST_LOG` overrides the configured default directive.

mod capture;

pub use capture::{CapturedEvent, CapturedSpan, SpanCapture};

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info,ragloom_chain=debug`.
    pub default_directive: String,
    pub format: LogFormat,
    /// Include the event target (module path) in each line.
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { default_directive: "info".into(), format: LogFormat::Pretty, with_target: true }
    }
}

impl TelemetryConfig {
    /// The filter `init_telemetry` installs.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))
    }
}

fn fmt_layer<S>(config: &TelemetryConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_target(config.with_target);
    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer(&config))
        .try_init()
}

/// Install the global subscriber with `capture` attached alongside the formatter.
pub fn init_with_capture(config: TelemetryConfig, capture: SpanCapture) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer(&config))
        .with(capture)
        .try_init()
}
