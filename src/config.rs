use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::CloseType;
use crate::schedule::Schedule;
use crate::structural::StructuralSd;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_pivot_strength() -> usize {
    5
}

fn default_look_back() -> usize {
    3
}

fn default_initial_hour() -> u32 {
    9
}

fn default_initial_minute() -> u32 {
    16
}

fn default_interval_minutes() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub input: InputConfig,
    #[serde(default)]
    pub structural_sd: StructuralSdConfig,
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Deserialize)]
pub struct InputConfig {
    /// JSON file holding the candle array, oldest first.
    pub path: String,
    /// Label used in notifications only.
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StructuralSdConfig {
    #[serde(default = "default_pivot_strength")]
    pub pivot_strength: usize,
    #[serde(default)]
    pub close_type: CloseType,
    #[serde(default = "default_look_back")]
    pub look_back_candles_for_signal: usize,
}

impl Default for StructuralSdConfig {
    fn default() -> Self {
        Self {
            pivot_strength: default_pivot_strength(),
            close_type: CloseType::default(),
            look_back_candles_for_signal: default_look_back(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_initial_hour")]
    pub initial_hour: u32,
    #[serde(default = "default_initial_minute")]
    pub initial_minute: u32,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            initial_hour: default_initial_hour(),
            initial_minute: default_initial_minute(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_log_format(config)?;
    validate_input(config)?;
    validate_structural_sd(config)?;
    validate_schedule(config)?;
    Ok(())
}

fn validate_log_format(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" is not valid",
                config.general.log_format
            ),
        }));
    }
    Ok(())
}

fn validate_input(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.input.path.trim().is_empty() {
        return Err(Report::new(ConfigError::Validation {
            field: "input.path must not be empty".into(),
        }));
    }
    Ok(())
}

fn validate_structural_sd(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    StructuralSd::new(&config.structural_sd).change_context(ConfigError::Validation {
        field: "structural_sd".into(),
    })?;
    Ok(())
}

fn validate_schedule(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if let Some(schedule) = &config.schedule {
        Schedule::new(schedule).change_context(ConfigError::Validation {
            field: "schedule".into(),
        })?;
    }
    Ok(())
}
