//! Process log setup.
//!
//! The process log is a diagnostic side channel on stderr and is separate
//! from the audit log. `LAPSCACHE_LOG` takes an `EnvFilter` directive;
//! without it only warnings are shown, or debug output with `--verbose`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "LAPSCACHE_LOG";

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "lapscache=debug" } else { "warn" })
    })
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(filter(verbose));
    let _ = match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
}
