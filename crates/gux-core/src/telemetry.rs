//! Tracing initialisation for the `gux` binary and embedding tools.
//!
//! Only the first call installs a subscriber; later calls are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crate targets that log at the requested level; everything else only warns.
const TARGETS: [&str; 2] = ["gux_core", "gux"];

/// Filter used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let mut directives = String::from("warn");
    for target in TARGETS {
        directives.push_str(&format!(",{target}={}", level.as_str().to_ascii_lowercase()));
    }
    directives
}

/// Install the global subscriber, logging to stderr so stdout carries only
/// the report. With `json`, lines are newline-delimited JSON tagged with the
/// emitting target.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let writer = std::io::stderr;

    let installed = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(writer).json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(writer))
            .try_init()
    };
    if installed.is_ok() {
        tracing::debug!(json, level = %level, "tracing initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_crate_targets() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,gux_core=debug,gux=debug"
        );
        assert!(EnvFilter::try_new(default_directives(Level::INFO)).is_ok());
    }

    #[test]
    fn test_second_init_is_ignored() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
