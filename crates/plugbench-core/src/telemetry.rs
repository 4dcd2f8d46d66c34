//! Log output for the plugbench binary.
//!
//! Lines go to stderr so stdout stays free for tables and reports. Verbose
//! runs also log when each `plugbench.subject` span closes, which carries the
//! subject's busy and idle time.

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the chosen level. Everything else logs at
/// `warn` unless `RUST_LOG` says otherwise.
const PLUGBENCH_TARGETS: [&str; 3] = ["plugbench", "plugbench_core", "plugbench_runner"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// Newline-delimited JSON, one object per event.
    Json,
}

/// How the global subscriber is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub format: LogFormat,
    pub level: Level,
    /// Log subject span timings on close.
    pub subject_timings: bool,
}

impl LogSettings {
    /// `--verbose` lowers the level to debug and turns on subject timings.
    pub fn from_flags(verbose: bool, json: bool) -> Self {
        Self {
            format: if json { LogFormat::Json } else { LogFormat::Pretty },
            level: if verbose { Level::DEBUG } else { Level::INFO },
            subject_timings: verbose,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset.
    pub fn default_directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        let mut directives = vec!["warn".to_string()];
        directives.extend(PLUGBENCH_TARGETS.iter().map(|t| format!("{t}={level}")));
        directives.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directives()))
    }
}

/// Install the global subscriber. Only the first call in a process takes
/// effect.
pub fn init_tracing(settings: &LogSettings) {
    let span_events = if settings.subject_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_span_events(span_events);
    let registry = tracing_subscriber::registry().with(settings.filter());

    match settings.format {
        LogFormat::Json => registry.with(layer.json()).try_init().ok(),
        LogFormat::Pretty => registry.with(layer).try_init().ok(),
    };
}
