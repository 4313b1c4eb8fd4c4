//! Logging setup
//!
//! Console-only tracing initialisation for the engine. The embedding
//! service owns file logging and rotation; the engine just needs a
//! subscriber with an env-filter so `RUST_LOG` works as expected.

use tracing_subscriber::{fmt, layer::SubscriberExt, prelude::*, EnvFilter};

/// Initialize the logging system (console only)
///
/// # Arguments
/// * `level` - Fallback log level when `RUST_LOG` is unset (e.g. "info")
/// * `json_format` - JSON output for production, pretty for development
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if json_format {
        let console_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        subscriber.with(console_layer).try_init()?;
    } else {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true);
        subscriber.with(console_layer).try_init()?;
    }

    Ok(())
}
