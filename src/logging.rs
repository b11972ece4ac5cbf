//! Logging configuration for dependency-injector-codegen
//!
//! Graph construction, validation and planning emit `tracing` events under
//! the `dependency_injector_codegen` target: `debug` at phase boundaries,
//! `trace` for per-key resolution and memo hits, `warn` when an element is
//! deferred to the next round. This module installs a subscriber for them.
//!
//! # Features
//!
//! - `logging` - Emit events (default)
//! - `logging-json` - JSON structured output (recommended for build servers)
//! - `logging-pretty` - Colorful pretty output (recommended for development)
//!
//! # Example
//!
//! ```rust,ignore
//! use dependency_injector_codegen::logging;
//!
//! // JSON if logging-json is enabled, pretty otherwise
//! logging::init();
//!
//! // Or configure it
//! logging::builder()
//!     .trace()
//!     .codegen_only()
//!     .compact()
//!     .init();
//! ```

#[cfg(feature = "logging")]
use tracing::Level;

/// Target of every event this crate emits
pub const TARGET: &str = "dependency_injector_codegen";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON structured logging; needs `logging-json`, pretty otherwise
    #[default]
    Json,
    /// Pretty colorful output (development)
    Pretty,
    /// Compact single-line output
    Compact,
}

/// Builder for logging configuration
#[cfg(feature = "logging")]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    respect_env: bool,
    ansi: bool,
    with_file: bool,
    with_line_number: bool,
}

#[cfg(feature = "logging")]
impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            respect_env: true,
            ansi: true,
            with_file: false,
            with_line_number: false,
        }
    }
}

#[cfg(feature = "logging")]
impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Per-key resolution and memo hits
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    /// Phase boundaries
    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    /// Deferred elements only
    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    /// Filter to only show logs from a specific target
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show events from this crate
    pub fn codegen_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    /// Whether `RUST_LOG` overrides the configured level and target
    pub fn respect_env(mut self, respect: bool) -> Self {
        self.respect_env = respect;
        self
    }

    /// Disable colors, e.g. when output goes to a build log file
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Include file names in log output
    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    /// Include line numbers in log output
    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
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

    /// The filter directive built from level and target
    pub fn directive(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        match self.target {
            Some(target) => format!("{}={}", target, level),
            None => level,
        }
    }

    /// Installs the subscriber.
    ///
    /// Returns `false` when a global subscriber was already installed, which
    /// happens when several processors run in one build process.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> bool {
        use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

        let filter = if self.respect_env {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
        } else {
            EnvFilter::new(self.directive())
        };

        let base = fmt::layer()
            .with_ansi(self.ansi)
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_target(true);
        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => base.json().boxed(),
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => base.pretty().boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().boxed(),
        };

        tracing_subscriber::registry().with(layer).with(filter).try_init().is_ok()
    }

    /// No-op when subscriber features are not available
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> bool {
        false
    }
}

/// Create a new logging builder
#[cfg(feature = "logging")]
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initialize logging with default settings
///
/// JSON when `logging-json` is enabled, otherwise pretty.
#[cfg(feature = "logging")]
pub fn init() -> bool {
    if cfg!(feature = "logging-json") {
        builder().json().init()
    } else {
        builder().pretty().init()
    }
}

/// Initialize logging for this crate only
///
/// # Example output
/// ```text
///   2024-01-01T00:00:00.000Z DEBUG dependency_injector_codegen: Validated binding graph, component: app.AppComponent, errors: 0
/// ```
#[cfg(feature = "logging")]
pub fn init_codegen_only() -> bool {
    builder().codegen_only().init()
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
        assert!(builder.respect_env);
        assert_eq!(builder.directive(), "debug");
    }

    #[test]
    fn test_builder_chain() {
        let builder = LoggingBuilder::new()
            .trace()
            .compact()
            .with_file()
            .without_ansi()
            .respect_env(false)
            .codegen_only();

        assert_eq!(builder.level, Level::TRACE);
        assert_eq!(builder.format, LogFormat::Compact);
        assert!(builder.with_file);
        assert!(!builder.ansi);
        assert!(!builder.respect_env);
        assert_eq!(builder.directive(), "dependency_injector_codegen=trace");
    }
}
