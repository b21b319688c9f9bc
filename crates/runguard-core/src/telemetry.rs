//! Process-wide tracing setup.
//!
//! Everything is written to stderr: the daemon answers requests on stdout
//! and the two streams must never interleave. `RUST_LOG` wins over the
//! level passed in.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber. `json` selects newline-delimited JSON
/// records instead of the human format.
///
/// Returns `false` when a global subscriber was already installed (only the
/// first call in a process takes effect).
pub fn init_tracing(json: bool, level: Level) -> bool {
    let base = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = if json {
        tracing_subscriber::registry()
            .with(filter(level))
            .with(base.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter(level))
            .with(base)
            .try_init()
    };
    installed.is_ok()
}

