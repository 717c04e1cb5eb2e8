//! Logging and tracing initialization for c2pack.
//!
//! Every pipeline step runs in its own span, so the JSON output groups
//! download, copy and compile events per package.

use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Configuration for the logging system.
#[derive(Default)]
pub struct LogConfig {
    /// Output logs as JSON (for machine parsing)
    pub json: bool,
    /// Enable verbose logging (sets default level to DEBUG)
    pub verbose: bool,
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` overrides the default `c2pack=info` / `c2pack=debug` filter.
pub fn init(config: LogConfig) {
    let default_level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("c2pack={}", default_level.as_str().to_lowercase()))
    });

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true)
                    .with_target(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .init();
    }
}

/// Rate limiter for progress lines, e.g. while a toolchain downloads.
pub struct LogThrottle {
    interval: Duration,
    last_log: Option<Instant>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_log: None,
        }
    }

    /// True on the first call and then at most once per interval.
    pub fn should_log(&mut self) -> bool {
        let now = Instant::now();
        match self.last_log {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_log = Some(now);
                true
            }
        }
    }
}
