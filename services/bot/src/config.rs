//! Configuration for the idle mover.
//!
//! Mover settings can come from a TOML file (`IDLEMOVER_CONFIG`) and are then
//! overridden per key from the environment. Connection settings are env-only.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use idlemover_reconcile::{DEFAULT_CHECK_FREQUENCY, DEFAULT_HOLDING_CHANNEL, DEFAULT_IDLE_THRESHOLD};
use serde::Deserialize;
use thiserror::Error;

/// Invalid mover settings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("checkFrequencySeconds must be a positive number, got {0}")]
    InvalidCheckFrequency(f64),

    #[error("idleThresholdSeconds must be a non-negative number, got {0}")]
    InvalidIdleThreshold(f64),

    #[error("holdingLocationName must not be empty")]
    EmptyHoldingChannel,
}

/// Settings of one running mover. Immutable once the mover starts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MoverConfig {
    /// Start the mover as soon as the bot is connected.
    pub auto_start: bool,

    /// Log intended moves instead of performing them.
    pub dry_run: bool,

    /// Seconds between reconciliation passes.
    pub check_frequency_seconds: f64,

    /// Comma-separated server group names whose members are never moved.
    pub exclude_groups: Option<String>,

    /// Move clients back once they are active again.
    pub auto_move_back: bool,

    /// Skip moving back into full or password-protected channels.
    pub respect_destination_limits: bool,

    /// Channel to move clients to when moving them back fails.
    pub fallback_location_name: Option<String>,

    /// Idle seconds after which a client is moved.
    pub idle_threshold_seconds: f64,

    /// Name of the holding channel.
    pub holding_location_name: String,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            dry_run: false,
            check_frequency_seconds: DEFAULT_CHECK_FREQUENCY.as_secs_f64(),
            exclude_groups: None,
            auto_move_back: true,
            respect_destination_limits: true,
            fallback_location_name: None,
            idle_threshold_seconds: DEFAULT_IDLE_THRESHOLD.as_secs_f64(),
            holding_location_name: DEFAULT_HOLDING_CHANNEL.to_string(),
        }
    }
}

impl MoverConfig {
    /// Load mover settings from a TOML file. Missing keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply `IDLEMOVER_*` overrides obtained through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("IDLEMOVER_AUTO_START") {
            self.auto_start = parse_flag(&v);
        }
        if let Some(v) = lookup("IDLEMOVER_DRY_RUN") {
            self.dry_run = parse_flag(&v);
        }
        if let Some(v) = lookup("IDLEMOVER_CHECK_FREQUENCY") {
            self.check_frequency_seconds = v
                .trim()
                .parse()
                .context("IDLEMOVER_CHECK_FREQUENCY must be a number (seconds).")?;
        }
        if let Some(v) = lookup("IDLEMOVER_EXCLUDE_GROUPS") {
            self.exclude_groups = Some(v);
        }
        if let Some(v) = lookup("IDLEMOVER_AUTO_MOVE_BACK") {
            self.auto_move_back = parse_flag(&v);
        }
        if let Some(v) = lookup("IDLEMOVER_RESPECT_LIMITS") {
            self.respect_destination_limits = parse_flag(&v);
        }
        if let Some(v) = lookup("IDLEMOVER_FALLBACK_CHANNEL") {
            self.fallback_location_name = Some(v);
        }
        if let Some(v) = lookup("IDLEMOVER_IDLE_THRESHOLD") {
            self.idle_threshold_seconds = v
                .trim()
                .parse()
                .context("IDLEMOVER_IDLE_THRESHOLD must be a number (seconds).")?;
        }
        if let Some(v) = lookup("IDLEMOVER_HOLDING_CHANNEL") {
            self.holding_location_name = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let freq = self.check_frequency_seconds;
        // Values below one nanosecond round down to a zero interval
        let usable = freq.is_finite()
            && Duration::try_from_secs_f64(freq).is_ok_and(|d| !d.is_zero());
        if !usable {
            return Err(ConfigError::InvalidCheckFrequency(freq));
        }

        let idle = self.idle_threshold_seconds;
        if !idle.is_finite() || idle < 0.0 || Duration::try_from_secs_f64(idle).is_err() {
            return Err(ConfigError::InvalidIdleThreshold(idle));
        }

        if self.holding_location_name.trim().is_empty() {
            return Err(ConfigError::EmptyHoldingChannel);
        }

        Ok(())
    }

    /// Interval between passes. Falls back to the default for values that
    /// [`validate`](Self::validate) rejects.
    pub fn check_frequency(&self) -> Duration {
        Duration::try_from_secs_f64(self.check_frequency_seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_CHECK_FREQUENCY)
    }

    /// Idle time a client must exceed to be moved.
    pub fn idle_threshold(&self) -> Duration {
        Duration::try_from_secs_f64(self.idle_threshold_seconds).unwrap_or(DEFAULT_IDLE_THRESHOLD)
    }

    /// Configured group names to exclude. Empty means no exclusion.
    pub fn excluded_group_names(&self) -> BTreeSet<String> {
        self.exclude_groups
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Fallback channel name, if one is configured.
    pub fn fallback_channel(&self) -> Option<&str> {
        self.fallback_location_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != "None")
    }
}

/// Query sessions are dropped by the server after a few minutes of silence.
const DEFAULT_KEEPALIVE_SECS: u64 = 180;

/// Process configuration.
#[derive(Clone)]
pub struct Config {
    /// Query interface address (host:port).
    pub query_addr: String,

    pub query_user: String,

    pub query_password: String,

    /// Virtual server to select after login.
    pub server_id: u64,

    /// Nickname shown for the bot's query client.
    pub nickname: String,

    /// Prefix of text commands, e.g. `!idlemover`.
    pub command_prefix: String,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Interval between keepalive commands on the query connection.
    pub keepalive_interval: Duration,

    pub mover: MoverConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("query_addr", &self.query_addr)
            .field("query_user", &self.query_user)
            .field("query_password", &"<redacted>")
            .field("server_id", &self.server_id)
            .field("nickname", &self.nickname)
            .field("command_prefix", &self.command_prefix)
            .field("log_level", &self.log_level)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("mover", &self.mover)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let query_addr =
            lookup("IDLEMOVER_QUERY_ADDR").unwrap_or_else(|| "127.0.0.1:10011".to_string());

        let query_user = lookup("IDLEMOVER_QUERY_USER").unwrap_or_else(|| "serveradmin".to_string());

        let query_password = lookup("IDLEMOVER_QUERY_PASSWORD")
            .context("Missing query password. Set IDLEMOVER_QUERY_PASSWORD.")?;

        let server_id: u64 = lookup("IDLEMOVER_SERVER_ID")
            .map(|v| v.trim().parse())
            .transpose()
            .context("IDLEMOVER_SERVER_ID must be an integer.")?
            .unwrap_or(1);

        let nickname = lookup("IDLEMOVER_NICKNAME").unwrap_or_else(|| "IdleMover".to_string());

        let command_prefix =
            lookup("IDLEMOVER_COMMAND_PREFIX").unwrap_or_else(|| "!idlemover".to_string());

        let log_level = lookup("IDLEMOVER_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let keepalive_secs: u64 = lookup("IDLEMOVER_KEEPALIVE_INTERVAL")
            .map(|v| v.trim().parse())
            .transpose()
            .context("IDLEMOVER_KEEPALIVE_INTERVAL must be an integer (seconds).")?
            .unwrap_or(DEFAULT_KEEPALIVE_SECS);
        if keepalive_secs == 0 {
            anyhow::bail!("IDLEMOVER_KEEPALIVE_INTERVAL must be greater than zero.");
        }

        let mut mover = match lookup("IDLEMOVER_CONFIG") {
            Some(path) => MoverConfig::from_file(Path::new(&path))?,
            None => MoverConfig::default(),
        };
        mover.apply_overrides(&lookup)?;
        mover.validate()?;

        Ok(Self {
            query_addr,
            query_user,
            query_password,
            server_id,
            nickname,
            command_prefix,
            log_level,
            keepalive_interval: Duration::from_secs(keepalive_secs),
            mover,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_mover_defaults() {
        let config = MoverConfig::default();
        assert!(config.auto_start);
        assert!(!config.dry_run);
        assert_eq!(config.check_frequency(), Duration::from_secs(30));
        assert_eq!(config.idle_threshold(), Duration::from_secs(600));
        assert_eq!(config.holding_location_name, "AFK");
        assert!(config.auto_move_back);
        assert!(config.respect_destination_limits);
        assert!(config.fallback_channel().is_none());
        assert!(config.excluded_group_names().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_excluded_group_names() {
        let config = MoverConfig {
            exclude_groups: Some("Server Admin, Guest,,Bots ".to_string()),
            ..Default::default()
        };
        let names: Vec<_> = config.excluded_group_names().into_iter().collect();
        assert_eq!(names, vec!["Bots", "Guest", "Server Admin"]);
    }

    #[test]
    fn test_fallback_channel_none_literal() {
        let config = MoverConfig {
            fallback_location_name: Some("None".to_string()),
            ..Default::default()
        };
        assert!(config.fallback_channel().is_none());

        let config = MoverConfig {
            fallback_location_name: Some("Lobby".to_string()),
            ..Default::default()
        };
        assert_eq!(config.fallback_channel(), Some("Lobby"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = MoverConfig {
            check_frequency_seconds: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidCheckFrequency(0.0)));

        let config = MoverConfig {
            check_frequency_seconds: 1e-10,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidCheckFrequency(1e-10)));

        let config = MoverConfig {
            check_frequency_seconds: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = MoverConfig {
            idle_threshold_seconds: -5.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidIdleThreshold(-5.0)));

        let config = MoverConfig {
            idle_threshold_seconds: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MoverConfig {
            holding_location_name: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyHoldingChannel));
    }

    #[test]
    fn test_from_lookup_requires_password() {
        let result = Config::from_lookup(lookup_from(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("IDLEMOVER_QUERY_PASSWORD", "secret"),
            ("IDLEMOVER_SERVER_ID", "3"),
            ("IDLEMOVER_DRY_RUN", "TRUE"),
            ("IDLEMOVER_AUTO_MOVE_BACK", "0"),
            ("IDLEMOVER_IDLE_THRESHOLD", "120.5"),
            ("IDLEMOVER_HOLDING_CHANNEL", "Away"),
        ]))
        .unwrap();

        assert_eq!(config.server_id, 3);
        assert_eq!(config.command_prefix, "!idlemover");
        assert_eq!(config.keepalive_interval, Duration::from_secs(180));
        assert!(config.mover.dry_run);
        assert!(!config.mover.auto_move_back);
        assert_eq!(config.mover.idle_threshold(), Duration::from_millis(120_500));
        assert_eq!(config.mover.holding_location_name, "Away");
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_from_lookup_rejects_invalid_number() {
        let result = Config::from_lookup(lookup_from(&[
            ("IDLEMOVER_QUERY_PASSWORD", "secret"),
            ("IDLEMOVER_CHECK_FREQUENCY", "often"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_keepalive_interval() {
        let config = Config::from_lookup(lookup_from(&[
            ("IDLEMOVER_QUERY_PASSWORD", "secret"),
            ("IDLEMOVER_KEEPALIVE_INTERVAL", "60"),
        ]))
        .unwrap();
        assert_eq!(config.keepalive_interval, Duration::from_secs(60));

        let result = Config::from_lookup(lookup_from(&[
            ("IDLEMOVER_QUERY_PASSWORD", "secret"),
            ("IDLEMOVER_KEEPALIVE_INTERVAL", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_with_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
dryRun = true
checkFrequencySeconds = 10
excludeGroups = "Admin,Bots"
fallbackLocationName = "Lobby"
holdingLocationName = "Sleeping"
"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = Config::from_lookup(lookup_from(&[
            ("IDLEMOVER_QUERY_PASSWORD", "secret"),
            ("IDLEMOVER_CONFIG", path.as_str()),
            ("IDLEMOVER_HOLDING_CHANNEL", "AFK Zone"),
        ]))
        .unwrap();

        assert!(config.mover.dry_run);
        assert_eq!(config.mover.check_frequency(), Duration::from_secs(10));
        assert_eq!(config.mover.excluded_group_names().len(), 2);
        assert_eq!(config.mover.fallback_channel(), Some("Lobby"));
        assert_eq!(config.mover.holding_location_name, "AFK Zone");
        // Unset keys keep their defaults
        assert!(config.mover.auto_start);
    }
}
