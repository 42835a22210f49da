//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`SILICA_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use serde::{Serialize, Deserialize};
use silica_core::TreeConfig;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Broadphase tuning
    #[serde(default)]
    pub collision: CollisionConfig,
    /// Frame loop settings
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Demo scene layout
    #[serde(default)]
    pub demo: DemoConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`SILICA_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // SILICA_COLLISION__FAT_MARGIN_RATIO=0.2 -> collision.fat_margin_ratio = 0.2
        figment = figment.merge(Env::prefixed("SILICA_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// Broadphase configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Leaf fattening margin as a fraction of the box extent
    pub fat_margin_ratio: f32,
    /// Minimum fattening margin in world units
    pub min_fat_margin: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        let tree = TreeConfig::default();
        Self {
            fat_margin_ratio: tree.fat_margin_ratio,
            min_fat_margin: tree.min_fat_margin,
        }
    }
}

impl From<&CollisionConfig> for TreeConfig {
    fn from(config: &CollisionConfig) -> Self {
        TreeConfig::new(config.fat_margin_ratio, config.min_fat_margin)
    }
}

/// Frame loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of frames the headless demo runs
    pub frames: u32,
    /// Fixed timestep in seconds
    pub timestep: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            timestep: 1.0 / 60.0,
        }
    }
}

/// Hero-and-walls demo layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Wall and hero side length in world units
    pub cell_size: f32,
    /// Walls along the top and bottom edges of the ring
    pub columns: u32,
    /// Walls along the left and right edges of the ring
    pub rows: u32,
    /// Hero speed in world units per second
    pub hero_speed: f32,
    /// Hero spin in radians per second
    pub hero_spin: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            cell_size: 48.0,
            columns: 12,
            rows: 8,
            hero_speed: 120.0,
            hero_spin: 1.5,
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Log collision stats every this many frames (0 = never)
    pub stats_interval: u32,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_interval: 60,
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}
