//! Logging configuration, as read from the `[logging]` table of a config file

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub console: ConsoleConfig,
    /// Rolling JSONL file, off unless configured
    pub file: Option<FileConfig>,
    pub json: JsonFields,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            json: JsonFields::default(),
        }
    }
}

impl LogConfig {
    fn with_console(level: &str, console: ConsoleConfig) -> Self {
        Self {
            level: level.to_string(),
            console,
            ..Default::default()
        }
    }

    /// Colored pretty output at debug level
    pub fn development() -> Self {
        Self::with_console(
            "debug",
            ConsoleConfig {
                target: ConsoleTarget::Stdout,
                format: LogFormat::Pretty,
                ansi: true,
            },
        )
    }

    /// Warnings only, on stderr, so stdout stays free for command output
    pub fn cli() -> Self {
        Self::with_console(
            "warn",
            ConsoleConfig {
                target: ConsoleTarget::Stderr,
                format: LogFormat::Pretty,
                ansi: false,
            },
        )
    }

    /// Daily rotated files under `log_dir`, nothing on the console
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig {
                target: ConsoleTarget::Off,
                ..Default::default()
            },
            file: Some(FileConfig {
                directory: log_dir,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn testing() -> Self {
        Self::with_console("warn", ConsoleConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub target: ConsoleTarget,
    pub format: LogFormat,
    /// Color codes, only honored by the pretty format
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            target: ConsoleTarget::Stdout,
            format: LogFormat::Json,
            ansi: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    Off,
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Json,
}

/// File output; files are always JSON lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "obscura".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Optional fields of JSON records. Event fields are always flattened and
/// the current span is always included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFields {
    /// Full span list, so operation ids reach nested events
    pub spans: bool,
    /// Source file and line
    pub location: bool,
    pub threads: bool,
}

impl Default for JsonFields {
    fn default() -> Self {
        Self {
            spans: true,
            location: true,
            threads: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_json_on_stdout() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.console.target, ConsoleTarget::Stdout);
        assert_eq!(config.console.format, LogFormat::Json);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_cli_config_keeps_stdout_clean() {
        let config = LogConfig::cli();
        assert_eq!(config.level, "warn");
        assert_eq!(config.console.target, ConsoleTarget::Stderr);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_production_writes_files_only() {
        let config = LogConfig::production(PathBuf::from("/var/log/obscura"));
        assert_eq!(config.console.target, ConsoleTarget::Off);
        let file = config.file.unwrap();
        assert_eq!(file.directory, PathBuf::from("/var/log/obscura"));
        assert_eq!(file.rotation, RotationStrategy::Daily);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: LogConfig = serde_json::from_str(
            r#"{"level":"trace","console":{"target":"stderr","format":"pretty"}}"#,
        )
        .unwrap();
        assert_eq!(config.level, "trace");
        assert_eq!(config.console.target, ConsoleTarget::Stderr);
        assert_eq!(config.console.format, LogFormat::Pretty);
        assert!(!config.console.ansi);
        assert_eq!(config.json, JsonFields::default());
    }

    #[test]
    fn test_unknown_target_rejected() {
        let result: Result<LogConfig, _> =
            serde_json::from_str(r#"{"console":{"target":"syslog"}}"#);
        assert!(result.is_err());
    }
}
