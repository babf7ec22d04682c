//! # Logger
//!
//! Process-wide logging setup for the hub and its applications.
//! Configures console output, rolling log files with non-blocking I/O, and
//! environment-based filtering on top of `tracing-subscriber`.
//!
//! * Every bus client runs on its own task, so the console layer can print
//!   thread names and ids to tell interleaved applications apart.
//! * [`LogSettings`] is the deserializable form used in the hub config file;
//!   [`Logger::from_settings`] turns it into a configured builder.
//! * Without an explicit filter, `RUST_LOG` overrides the configured level.
//!
//! ## Example
//!
//! ```rust
//! # use hearth_logger::{Logger, LevelFilter};
//!
//! let _logger = Logger::builder()
//!     .name("hearthd")
//!     .console(true)
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";

/// Logging section of the hub configuration file.
///
/// ```toml
/// [log]
/// name = "hearthd"
/// level = "debug"
/// directory = "/var/log/hearth"
/// rotation = "daily"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub name: String,
    pub level: String,
    pub filter: Option<String>,
    pub console: bool,
    pub thread_names: bool,
    pub directory: Option<PathBuf>,
    pub rotation: String,
    pub max_files: usize,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            name: "hearthd".to_owned(),
            level: "info".to_owned(),
            filter: None,
            console: true,
            thread_names: false,
            directory: None,
            rotation: "daily".to_owned(),
            max_files: DEFAULT_MAX_FILES,
            json: false,
        }
    }
}

#[derive(Debug)]
struct LoggerConfig {
    console: bool,
    thread_names: bool,
    path: Option<PathBuf>,
    level: LevelFilter,
    rotation: Rotation,
    max_files: usize,
    json: bool,
    env_filter: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            console: true,
            thread_names: false,
            path: None,
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            env_filter: None,
        }
    }
}

#[derive(Debug)]
pub struct NoName;
#[derive(Debug)]
pub struct WithName(String);

mod private {
    pub trait Sealed {}
}
impl private::Sealed for NoName {}
impl private::Sealed for WithName {}

/// A builder for configuring and initializing the global tracing subscriber.
///
/// The logger name is mandatory and enforced at compile time: `init` only
/// exists once [`LoggerBuilder::name`] has been called.
#[derive(Debug)]
pub struct LoggerBuilder<N: private::Sealed = NoName> {
    config: LoggerConfig,
    name: N,
}

impl LoggerBuilder<NoName> {
    /// Sets the name used in log file prefixes.
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<WithName> {
        LoggerBuilder { config: self.config, name: WithName(name.into()) }
    }
}

impl LoggerBuilder<WithName> {
    /// Configures the minimum log level to be emitted.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Adds an explicit env filter (e.g., `hearth_bus=trace,hearthd=debug`).
    ///
    /// `RUST_LOG` is ignored when an explicit filter is set.
    /// Invalid filters make [`LoggerBuilder::init`] return an error.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.env_filter = Some(filter.into());
        self
    }

    /// Enables console logging.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    /// Prints thread names and ids on the console layer.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn thread_names(mut self, enabled: bool) -> Self {
        self.config.thread_names = enabled;
        self
    }

    /// Writes logs into rolling files inside `path`.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = Some(path.into());
        self
    }

    /// Configures the log file rotation strategy. Ignored without [`LoggerBuilder::path`].
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.config.rotation = rotation;
        self
    }

    /// Configures the maximum number of log files to keep.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.config.max_files = max;
        self
    }

    /// Writes file logs as JSON lines.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn json(mut self, enabled: bool) -> Self {
        self.config.json = enabled;
        self
    }

    /// Consumes the builder and installs the global tracing subscriber.
    ///
    /// # Returns
    /// A [`Logger`] handle owning the non-blocking file writer guard, if any.
    /// Keep it alive until shutdown so buffered lines are flushed.
    ///
    /// # Errors
    /// Returns [`LoggerError::Subscriber`] if a global subscriber has already been set,
    /// [`LoggerError::InvalidConfiguration`] for invalid builder settings, and
    /// [`LoggerError::Io`]/[`LoggerError::Appender`] when file output cannot be prepared.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let config = self.config;
        validate_config(&config, &self.name.0)?;
        let env_filter = build_env_filter(&config)?;

        let mut layers = Vec::new();
        if config.console {
            layers.push(
                layer()
                    .compact()
                    .with_ansi(true)
                    .with_thread_names(config.thread_names)
                    .with_thread_ids(config.thread_names)
                    .boxed(),
            );
        }

        let guard = match config.path {
            Some(path) => {
                fs::create_dir_all(&path)
                    .context(format!("Failed to create path: {}", path.display()))?;

                let appender = RollingFileAppender::builder()
                    .rotation(config.rotation)
                    .filename_prefix(&self.name.0)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(config.max_files)
                    .build(&path)
                    .context(format!("Log directory: {}", path.display()))?;

                let (writer, guard) = tracing_appender::non_blocking(appender);
                let file_layer = layer().with_writer(writer).with_ansi(false);
                layers.push(if config.json { file_layer.json().boxed() } else { file_layer.boxed() });
                Some(guard)
            },
            None => None,
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "No logging layers enabled. Enable console or file output.".into(),
                context: None,
            });
        }

        tracing_subscriber::registry().with(env_filter).with(layers).try_init()?;

        Ok(Logger { guard })
    }
}

/// A handle to the initialized logging system.
///
/// Holds the background writer guard. Drop it only when the process is
/// shutting down.
#[must_use = "Dropping this handle will stop background logging threads."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Returns a new [`LoggerBuilder`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use hearth_logger::{LevelFilter, Logger};
    ///
    /// let _logger = Logger::builder()
    ///     .name("hearthd")
    ///     .level(LevelFilter::DEBUG)
    ///     .init()
    ///     .unwrap();
    /// ```
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder { config: LoggerConfig::default(), name: NoName }
    }

    /// Builds a configured (not yet initialized) builder from [`LogSettings`].
    ///
    /// # Errors
    /// Returns [`LoggerError::InvalidConfiguration`] for an unknown level or rotation.
    pub fn from_settings(settings: &LogSettings) -> Result<LoggerBuilder<WithName>, LoggerError> {
        let level = LevelFilter::from_str(&settings.level).map_err(|e| {
            LoggerError::InvalidConfiguration {
                message: format!("Invalid level '{}': {e}", settings.level).into(),
                context: None,
            }
        })?;

        let mut builder = Self::builder()
            .name(settings.name.clone())
            .level(level)
            .console(settings.console)
            .thread_names(settings.thread_names)
            .rotation(parse_rotation(&settings.rotation)?)
            .max_files(settings.max_files)
            .json(settings.json);
        if let Some(filter) = &settings.filter {
            builder = builder.env_filter(filter.clone());
        }
        if let Some(directory) = &settings.directory {
            builder = builder.path(directory.clone());
        }
        Ok(builder)
    }

    /// Best-effort synchronization point before shutdown.
    pub fn flush(&self) {
        tracing::debug!("Logger flushed");
    }

    /// Returns the non-blocking file writer guard, if file output is enabled.
    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

fn parse_rotation(raw: &str) -> Result<Rotation, LoggerError> {
    match raw.to_ascii_lowercase().as_str() {
        "minutely" => Ok(Rotation::MINUTELY),
        "hourly" => Ok(Rotation::HOURLY),
        "daily" => Ok(Rotation::DAILY),
        "never" => Ok(Rotation::NEVER),
        other => Err(LoggerError::InvalidConfiguration {
            message: format!("Unknown rotation '{other}'").into(),
            context: Some("expected minutely, hourly, daily or never".into()),
        }),
    }
}

fn validate_config(config: &LoggerConfig, name: &str) -> Result<(), LoggerError> {
    if name.trim().is_empty() {
        return Err(LoggerError::InvalidConfiguration {
            message: "Logger name cannot be empty".into(),
            context: None,
        });
    }

    if config.path.is_some() && config.max_files == 0 {
        return Err(LoggerError::InvalidConfiguration {
            message: "max_files must be greater than zero".into(),
            context: None,
        });
    }

    Ok(())
}

fn build_env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(config.level.into());
    match &config.env_filter {
        Some(filter) => builder.parse(filter).map_err(|e| LoggerError::InvalidConfiguration {
            message: format!("Invalid env filter '{filter}': {e}").into(),
            context: None,
        }),
        None => Ok(builder.from_env_lossy()),
    }
}
