//! Log subscriber setup for the container's `tracing` output
//!
//! Every event the container emits uses the `bean_container` target, so the
//! container's own chatter can be isolated from the application's.
//!
//! # Features
//!
//! - `logging` - Emit container events through `tracing` (default)
//! - `logging-json` - JSON structured output
//! - `logging-pretty` - Multi-line human-readable output
//!
//! Without either subscriber feature the `init*` functions do nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use bean_container::logging;
//!
//! // Container events only, at TRACE, with source locations
//! logging::builder()
//!     .trace()
//!     .container_only()
//!     .with_file()
//!     .with_line_number()
//!     .compact()
//!     .init();
//!
//! // Or honour RUST_LOG, falling back to DEBUG
//! logging::builder().from_env().init();
//! ```

#[cfg(feature = "logging")]
use tracing::Level;

/// Target every container event is logged under.
pub const TARGET: &str = "bean_container";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    /// Single line per event
    Compact,
}

#[cfg(feature = "logging")]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    from_env: bool,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

#[cfg(feature = "logging")]
impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::default(),
            target: None,
            from_env: false,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

#[cfg(feature = "logging")]
impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    pub fn error(self) -> Self {
        self.with_level(Level::ERROR)
    }

    /// Only show events from `target`.
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show container events.
    pub fn container_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    /// Take the filter from `RUST_LOG` when it is set and valid. The
    /// configured level and target apply otherwise.
    pub fn from_env(mut self) -> Self {
        self.from_env = true;
        self
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Filter directive built from the configured level and target.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{target}={}", self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the subscriber globally.
    ///
    /// Returns `false` if a global subscriber was already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> bool {
        use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

        let filter = if self.from_env {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
        } else {
            EnvFilter::new(self.directive())
        };

        let base = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_thread_names(self.with_thread_names)
            .with_target(true);

        let layer = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => base.json().boxed(),
            // JSON output needs the `logging-json` feature.
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => base.boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().boxed(),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_ok()
    }

    /// No subscriber feature enabled: nothing to install.
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> bool {
        false
    }
}

#[cfg(feature = "logging")]
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install the default subscriber: JSON with `logging-json`, otherwise
/// pretty with `logging-pretty`. `RUST_LOG` overrides the DEBUG default.
#[cfg(feature = "logging")]
pub fn init() -> bool {
    let builder = builder().from_env();
    if cfg!(feature = "logging-json") {
        builder.json().init()
    } else {
        builder.pretty().init()
    }
}

/// JSON structured output at DEBUG.
///
/// ```json
/// {"timestamp":"2026-01-01T00:00:00.000Z","level":"DEBUG","fields":{"message":"Creating instance of bean","bean":"repository","scope":"singleton"},"target":"bean_container"}
/// ```
#[cfg(feature = "logging")]
pub fn init_json() -> bool {
    builder().json().debug().init()
}

/// Human-readable output at DEBUG.
#[cfg(feature = "logging")]
pub fn init_pretty() -> bool {
    builder().pretty().debug().init()
}

/// Container events only, at DEBUG.
#[cfg(feature = "logging")]
pub fn init_container_only() -> bool {
    builder().container_only().debug().init()
}

#[cfg(all(test, feature = "logging"))]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Json);
        assert!(builder.target.is_none());
        assert!(!builder.from_env);
        #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
        assert_eq!(builder.directive(), "DEBUG");
    }

    #[test]
    fn test_builder_chain() {
        let builder = LoggingBuilder::new()
            .trace()
            .compact()
            .with_file()
            .with_line_number()
            .container_only()
            .from_env();

        assert_eq!(builder.level, Level::TRACE);
        assert_eq!(builder.format, LogFormat::Compact);
        assert!(builder.with_file);
        assert!(builder.with_line_number);
        assert!(builder.from_env);
        #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
        assert_eq!(builder.directive(), "bean_container=TRACE");
    }
}
