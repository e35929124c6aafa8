//! Configuration loading and config file resolution
//!
//! Settings live in a small TOML file:
//!
//! ```toml
//! [selector]
//! default_audience = "individual"
//! auto_detect = true
//! detection_delay_ms = 500
//! acceptance_threshold = 0.5
//! preference_ttl_days = 30
//! referrer_keywords = ["alumniassoc"]
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Missing files never stop startup: a warning is logged and compiled
//! defaults are used. A file that exists but does not parse is an error.

use crate::events::AudienceType;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ALUMNET_CONFIG";

/// Root of the TOML configuration file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Audience selector settings
    pub selector: SelectorSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Audience selector settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorSettings {
    /// Audience displayed before (or without) detection
    pub default_audience: AudienceType,
    /// Run detection on mount
    pub auto_detect: bool,
    /// Render option descriptions
    pub show_description: bool,
    /// Delay before reading signals, letting the page settle
    pub detection_delay_ms: u64,
    /// Minimum confidence a winning signal needs
    pub acceptance_threshold: f64,
    /// Stored preferences older than this are ignored (0 disables expiry)
    pub preference_ttl_days: u32,
    /// Extra host keywords treated as institutional referrers
    pub referrer_keywords: Vec<String>,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            default_audience: AudienceType::Individual,
            auto_detect: true,
            show_description: true,
            detection_delay_ms: 500,
            acceptance_threshold: 0.5,
            preference_ttl_days: 30,
            referrer_keywords: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let threshold = self.selector.acceptance_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "acceptance_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        Ok(())
    }
}

/// Config file resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config directory (`<config_dir>/alumnet/config.toml`), if present
///
/// Returns `None` when no candidate applies; callers fall back to compiled defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// Get default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("alumnet").join("config.toml"))
}

/// Resolve and load configuration, degrading to defaults when no file exists
pub fn load_config(cli_arg: Option<&Path>, env_var_name: &str) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg, env_var_name) else {
        debug!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    debug!("Loading config from {}", path.display());
    TomlConfig::load(&path)
}
