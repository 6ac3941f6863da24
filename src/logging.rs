//! Logging setup for index builds.
//!
//! Compact timestamped output with per-module levels taken from the
//! `[logging]` settings. `RUST_LOG` overrides the configuration.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "embix::indexing" = "debug"   # partition and flush logs
//! ```
//!
//! # Environment Variable
//!
//! ```bash
//! RUST_LOG=embix::indexing::builder=info,embix::storage=debug
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Filter directives for `config`: the default level, then module overrides
/// in name order.
pub fn directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut directives = config.default.clone();
    for (module, level) in modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

/// Install the global subscriber.
///
/// Only the first call has an effect. Does nothing if the embedding
/// application already installed a subscriber.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
            tracing::debug!("[logging] subscriber already installed");
        }
    });
}

/// Initialize logging with `default = "warn"`.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an event with scope context at info level.
///
/// # Examples
/// ```ignore
/// log_event!("builder", "partitioned", "{} partitions", plan.count);
/// log_event!("builder", "cancelled");
/// ```
#[macro_export]
macro_rules! log_event {
    ($scope:expr, $event:expr) => {
        tracing::info!("[{}] {}", $scope, $event)
    };
    ($scope:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $scope, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("writer", "flushed", "{} tokens", stats.tokens);
/// ```
#[macro_export]
macro_rules! debug_event {
    ($scope:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $scope, $event)
    };
    ($scope:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $scope, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives() {
        assert_eq!(directives(&LoggingConfig::default()), "warn");

        let mut config = LoggingConfig {
            default: "info".to_string(),
            ..LoggingConfig::default()
        };
        config.modules.insert("embix::storage".into(), "trace".into());
        config.modules.insert("embix::indexing".into(), "debug".into());
        assert_eq!(
            directives(&config),
            "info,embix::indexing=debug,embix::storage=trace"
        );
    }

    #[test]
    fn test_init_twice() {
        init();
        init_with_config(&LoggingConfig::default());
        log_event!("test", "initialized");
        debug_event!("test", "detail", "{}", 1);
    }
}
