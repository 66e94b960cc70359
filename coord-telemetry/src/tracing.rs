use std::io;
use std::sync::Once;

use coord_config::Environment;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable enabling log output in tests.
pub const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to install the log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Flushes buffered log lines when dropped.
///
/// Keep it alive in `main` for as long as the program logs.
#[must_use = "dropping the flusher stops log output"]
#[derive(Debug)]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for `app_name`, formatted for the environment in
/// `APP_ENVIRONMENT`.
///
/// `RUST_LOG` overrides the default filter, which logs `info` and above from the application and
/// the `coord` library. Records emitted through the `log` crate are forwarded as well.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TelemetryError> {
    let environment = Environment::load()?;

    init_tracing_for_environment(app_name, environment)
}

/// Installs the global subscriber with output formatted for `environment`.
///
/// Development output is human readable; production output is one JSON object per line.
pub fn init_tracing_for_environment(
    app_name: &str,
    environment: Environment,
) -> Result<LogFlusher, TelemetryError> {
    LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(app_name)));
    let (writer, guard) = tracing_appender::non_blocking(io::stdout());
    let registry = tracing_subscriber::registry().with(filter);

    if environment.is_prod() {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(writer))
            .try_init()?;
    }

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber writing through the test harness, once per process.
///
/// Does nothing unless `ENABLE_TRACING` is set, so test output stays quiet by default.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var_os(ENABLE_TRACING_ENV_NAME).is_none() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("coord=debug"));

        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Default filter: `info` for the application target and the `coord` library.
fn default_directives(app_name: &str) -> String {
    let target = app_name.replace('-', "_");

    format!("{target}=info,coord=info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_use_crate_target_names() {
        assert_eq!(
            default_directives("coord-playground"),
            "coord_playground=info,coord=info"
        );
    }

    #[test]
    fn test_tracing_can_be_initialized_repeatedly() {
        init_test_tracing();
        init_test_tracing();
    }
}
