mod artifacts;

pub use artifacts::{
    ArtifactLog, ArtifactStream, PROCESSED_CHATHISTORY, PROCESSED_CONFIG, REQUEST, RESPONSE,
    THINKING,
};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format of the log layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Configuration for log output.
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub level: Level,
    /// Per-module level overrides (e.g. "chathistory_llm" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            module_levels: Vec::new(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    fn filter_directives(&self) -> String {
        let mut filter = self.level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Install the global subscriber. Logs go to stderr; stdout may carry the
/// generated document. Call once at startup.
pub fn init_logging(config: LogConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let fmt_layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_list(true)
            .with_filter(env_filter)
            .boxed(),
    };

    if let Err(e) = tracing_subscriber::registry().with(fmt_layer).try_init() {
        eprintln!("chathistory-telemetry: logging already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_info() {
        assert_eq!(LogConfig::default().filter_directives(), "info");
    }

    #[test]
    fn module_levels_extend_filter() {
        let config = LogConfig {
            level: Level::WARN,
            module_levels: vec![("chathistory_llm".into(), Level::DEBUG)],
            format: LogFormat::Json,
        };
        assert_eq!(config.filter_directives(), "warn,chathistory_llm=debug");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(LogConfig::default());
        init_logging(LogConfig::default());
    }
}
