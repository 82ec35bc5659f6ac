use crate::domain::models::{ColorCommand, DeviceIdentity, ServiceIdentifier};
use crate::domain::pattern::PatternPalette;
use crate::infrastructure::bluetooth::protocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "rgbw_light".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Device Settings
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,

    // Pattern Settings
    #[serde(default = "default_pattern_interval_ms")]
    pub pattern_interval_ms: u64,
    #[serde(default = "default_pattern_palette")]
    pub pattern_palette: Vec<String>, // "RRGGBBWW"

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            service_uuid: default_service_uuid(),
            pattern_interval_ms: default_pattern_interval_ms(),
            pattern_palette: default_pattern_palette(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_device_name() -> String {
    protocol::DEVICE_NAME.to_string()
}
fn default_service_uuid() -> String {
    protocol::SERVICE_UUID.to_string()
}
fn default_pattern_interval_ms() -> u64 {
    protocol::PATTERN_INTERVAL_MS
}
fn default_pattern_palette() -> Vec<String> {
    protocol::DEFAULT_PALETTE
        .iter()
        .map(ColorCommand::to_hex)
        .collect()
}

/// Validated, static configuration for a light controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub device: DeviceIdentity,
    pub service: ServiceIdentifier,
    pub palette: PatternPalette,
    pub pattern_interval: Duration,
}

impl Settings {
    pub fn controller_config(&self) -> anyhow::Result<ControllerConfig> {
        let device_name = self.device_name.trim();
        if device_name.is_empty() {
            anyhow::bail!("Device name must not be empty");
        }

        let service = self
            .service_uuid
            .parse::<ServiceIdentifier>()
            .map_err(|e| anyhow::anyhow!("Invalid service UUID '{}': {}", self.service_uuid, e))?;

        if self.pattern_interval_ms == 0 {
            anyhow::bail!("Pattern interval must be greater than zero");
        }

        let colors = self
            .pattern_palette
            .iter()
            .map(|hex| ColorCommand::from_hex(hex))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let palette = PatternPalette::new(colors)
            .ok_or_else(|| anyhow::anyhow!("Pattern palette must not be empty"))?;

        Ok(ControllerConfig {
            device: DeviceIdentity::new(device_name),
            service,
            palette,
            pattern_interval: Duration::from_millis(self.pattern_interval_ms),
        })
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the per-user config directory
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Load from `settings_path`, falling back to defaults if it is missing
    /// or cannot be parsed
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("RgbwLightController");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
