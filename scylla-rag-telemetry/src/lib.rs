//! Logging setup and span capture for scylla-rag.
//!
//! The library crate only emits `tracing` spans and events. Binaries pick an
//! output format with [`init_console`] or [`init_json`]; tests install a
//! [`SpanCapture`] layer to assert on the spans a pipeline stage produced.
//!
//! Both initializers honour `RUST_LOG` and fall back to the supplied filter
//! when it is unset or unparsable.

pub mod memory;

pub use memory::{CapturedSpan, SpanCapture};
pub use tracing_subscriber::util::TryInitError;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Human-readable logs on stderr.
///
/// Stdout stays free for the streamed answer.
pub fn init_console(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
}

/// One JSON object per line on stderr, including the active span stack.
pub fn init_json(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init()
}
