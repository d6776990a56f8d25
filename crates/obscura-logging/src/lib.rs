//! Structured logging for Obscura
//!
//! Sets up a `tracing` subscriber with JSONL output by default, optional
//! pretty console output for development, and optional rolling file output.
//!
//! # Quick Start
//!
//! ```ignore
//! use obscura_logging::{LogConfig, ObscuraSubscriberBuilder};
//!
//! // JSONL to console
//! let _guard = ObscuraSubscriberBuilder::new().init();
//!
//! // Pretty human-readable output
//! let _guard = ObscuraSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! # Operation Correlation
//!
//! ```ignore
//! use obscura_logging::OperationContext;
//!
//! let ctx = OperationContext::new("encrypt").with_key("photo-1");
//! ctx.span().in_scope(|| tracing::info!("Sealing"));
//! ```

pub mod config;
pub mod correlation;

pub use config::{
    ConsoleConfig, ConsoleTarget, FileConfig, JsonFields, LogConfig, LogFormat, RotationStrategy,
};
pub use correlation::{OperationContext, fields};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Log file setup failed: {0}")]
    File(String),

    #[error("Subscriber initialization failed: {0}")]
    Init(String),
}

/// Builder for configuring and initializing the Obscura logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct ObscuraSubscriberBuilder {
    config: LogConfig,
}

impl ObscuraSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Route console output, or turn it off with `ConsoleTarget::Off`
    pub fn with_console(mut self, target: ConsoleTarget) -> Self {
        self.config.console.target = target;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Current configuration
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the filter: `RUST_LOG` wins, then the configured default level
    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.config.level).map_err(|e| LoggingError::InvalidFilter {
            filter: self.config.level.clone(),
            reason: e.to_string(),
        })
    }

    /// Install the subscriber globally, failing if one is already set
    ///
    /// The returned guard flushes file output on drop; keep it alive for
    /// the lifetime of the program.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = self.env_filter()?;
        let console = &self.config.console;
        let json = &self.config.json;
        let (pretty_writer, json_writer) = match console.format {
            LogFormat::Pretty => (console_writer(console.target), None),
            LogFormat::Json => (None, console_writer(console.target)),
        };

        let (file_sink, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let pretty_console = pretty_writer.map(|w| {
            tracing_subscriber::fmt::layer()
                .with_writer(w)
                .pretty()
                .with_ansi(console.ansi)
                .with_target(true)
        });

        let json_console = json_writer.map(|w| {
            tracing_subscriber::fmt::layer()
                .with_writer(w)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(json.spans)
                .with_file(json.location)
                .with_line_number(json.location)
                .with_thread_ids(json.threads)
                .with_thread_names(json.threads)
        });

        // Files are always JSONL
        let file_layer = file_sink.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(json.spans)
                .with_file(json.location)
                .with_line_number(json.location)
                .with_thread_ids(json.threads)
                .with_thread_names(json.threads)
                .with_ansi(false)
                .with_writer(writer)
        });

        Registry::default()
            .with(env_filter)
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;

        Ok(guard)
    }

    /// Install the subscriber globally
    ///
    /// Failures (a subscriber already installed, a bad filter) are reported
    /// on stderr and otherwise ignored, so embedding code and tests can call
    /// this unconditionally.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("obscura-logging: {e}");
                None
            }
        }
    }
}

impl Default for ObscuraSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn console_writer(target: ConsoleTarget) -> Option<BoxMakeWriter> {
    match target {
        ConsoleTarget::Off => None,
        ConsoleTarget::Stdout => Some(BoxMakeWriter::new(std::io::stdout)),
        ConsoleTarget::Stderr => Some(BoxMakeWriter::new(std::io::stderr)),
    }
}

fn file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match file_config.rotation {
        RotationStrategy::Never => Rotation::NEVER,
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .filename_suffix("log")
        .build(&file_config.directory)
        .map_err(|e| LoggingError::File(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}
