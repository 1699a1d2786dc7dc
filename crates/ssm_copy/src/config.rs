use crate::models::error::ConfigError;
use crate::utils::retry::RetryPolicy;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "SSM_COPY";
pub const DEFAULT_S3_PREFIX: &str = "ey";
pub const DEFAULT_DOCUMENT_NAME: &str = "AWS-RunShellScript";

// Custom deserializer for Duration that accepts integer seconds
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

// Integer seconds; absent or 0 means no limit
fn deserialize_option_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<u64>::deserialize(deserializer)? {
        Some(0) | None => Ok(None),
        Some(secs) => Ok(Some(Duration::from_secs(secs))),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsConfig {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_s3_prefix")]
    pub prefix: String,
    /// Custom endpoint for S3-compatible stores.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_s3_prefix() -> String {
    DEFAULT_S3_PREFIX.to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: default_s3_prefix(),
            endpoint: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_document_name")]
    pub document_name: String,
    /// Remote execution timeout passed to the shell document.
    #[serde(
        default = "default_execution_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub execution_timeout: Duration,
}

fn default_document_name() -> String {
    DEFAULT_DOCUMENT_NAME.to_string()
}

fn default_execution_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            document_name: default_document_name(),
            execution_timeout: default_execution_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollerConfig {
    /// Delay between two passes over the active instance set.
    #[serde(default = "default_poll_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    #[serde(default)]
    pub max_rounds: Option<u32>,
    #[serde(
        default = "default_max_poll_duration",
        deserialize_with = "deserialize_option_duration"
    )]
    pub max_poll_duration: Option<Duration>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_max_poll_duration() -> Option<Duration> {
    Some(Duration::from_secs(600))
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_rounds: None,
            max_poll_duration: default_max_poll_duration(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from an optional file, then `SSM_COPY_*` environment
    /// variables (nested keys separated by `__`, e.g. `SSM_COPY_S3__BUCKET`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.document_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "command.document_name must not be empty".to_string(),
            ));
        }
        if self.command.execution_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "command.execution_timeout must be at least one second".to_string(),
            ));
        }
        if self.poller.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "poller.retry.multiplier must be >= 1.0".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be `text` or `json`, got `{}`",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.s3.prefix, "ey");
        assert_eq!(config.command.document_name, "AWS-RunShellScript");
        assert_eq!(config.command.execution_timeout, Duration::from_secs(60));
        assert_eq!(config.poller.interval, Duration::from_secs(3));
        assert_eq!(config.poller.max_poll_duration, Some(Duration::from_secs(600)));
        assert_eq!(config.poller.retry.max_attempts, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "s3:\n  bucket: staging-bucket\n  prefix: uploads\npoller:\n  interval: 1\n  max_poll_duration: 0\n  retry:\n    max_attempts: 2\nlogging:\n  format: json"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.s3.bucket.as_deref(), Some("staging-bucket"));
        assert_eq!(config.s3.prefix, "uploads");
        assert_eq!(config.poller.interval, Duration::from_secs(1));
        assert_eq!(config.poller.max_poll_duration, None);
        assert_eq!(config.poller.retry.max_attempts, 2);
        assert_eq!(config.poller.retry.initial_delay_ms, 500);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.command.execution_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/ssm-copy.yaml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
