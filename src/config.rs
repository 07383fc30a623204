//! Configuration management for fectrl-sync.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (FECTRL_RELAY_DEPTH, etc.)
//! 2. Project-local config file (`./fectrl-sync.toml`)
//! 3. User config file (`~/.config/fectrl-sync/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # fectrl-sync.toml
//!
//! # Synchronizer pipeline depth (destination cycles of latency)
//! relay_depth = 2
//!
//! # Reset settle delay, in each domain's own ticks
//! settle_delay = 4
//!
//! # TDC timeout window and auto re-arm cadence, in control ticks
//! tdc_timeout = 64
//! tdc_cadence = 0
//!
//! # Tick periods per domain, in simulation time units
//! control_period = 1
//! reference_period = 5
//! sample_period = 2
//! link_period = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// fectrl-sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Synchronizer pipeline depth for all relays.
    pub relay_depth: Option<usize>,
    /// Reset settle delay in per-domain ticks.
    pub settle_delay: Option<u64>,
    /// TDC measurement timeout window in control ticks.
    pub tdc_timeout: Option<u64>,
    /// TDC automatic re-arm cadence in control ticks (0 = manual only).
    pub tdc_cadence: Option<u64>,
    /// Control domain tick period.
    pub control_period: Option<u64>,
    /// Reference domain tick period.
    pub reference_period: Option<u64>,
    /// Sample domain tick period.
    pub sample_period: Option<u64>,
    /// Link domain tick period.
    pub link_period: Option<u64>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `fectrl-sync.toml`
    /// 3. User config `~/.config/fectrl-sync/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }
        if let Some(local_config) = Self::load_local_config() {
            config.merge(local_config);
        }
        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Relay depth, default 2 (double latch).
    pub fn relay_depth(&self) -> usize {
        self.relay_depth
            .unwrap_or(crate::domain::relay::DEFAULT_STAGES)
    }

    /// Reset settle delay, default 4 ticks.
    pub fn settle_delay(&self) -> u64 {
        self.settle_delay.unwrap_or(4)
    }

    /// TDC timeout window, default 64 control ticks.
    pub fn tdc_timeout(&self) -> u64 {
        self.tdc_timeout.unwrap_or(64)
    }

    /// TDC auto re-arm cadence, default 0 (manual re-arm only).
    pub fn tdc_cadence(&self) -> u64 {
        self.tdc_cadence.unwrap_or(0)
    }

    /// Control domain period, default 1.
    pub fn control_period(&self) -> u64 {
        self.control_period.unwrap_or(1)
    }

    /// Reference domain period, default 5.
    pub fn reference_period(&self) -> u64 {
        self.reference_period.unwrap_or(5)
    }

    /// Sample domain period, default 2.
    pub fn sample_period(&self) -> u64 {
        self.sample_period.unwrap_or(2)
    }

    /// Link domain period, default 3.
    pub fn link_period(&self) -> u64 {
        self.link_period.unwrap_or(3)
    }

    /// Load user configuration from ~/.config/fectrl-sync/config.toml
    fn load_user_config() -> Option<Self> {
        let config_dir = dirs::config_dir()?;
        let config_path = config_dir.join("fectrl-sync").join("config.toml");
        Self::load_from_file(&config_path)
    }

    /// Load project-local configuration from ./fectrl-sync.toml
    fn load_local_config() -> Option<Self> {
        Self::load_from_file(Path::new("fectrl-sync.toml"))
    }

    /// Load and parse a config file, returning None if it does not
    /// exist or fails to parse (with a warning).
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to read config {}: {}", path.display(), e);
                return None;
            }
        };
        match toml::from_str(&contents) {
            Ok(config) => {
                log::debug!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                log::warn!("Failed to parse config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one; `other`'s set fields win.
    fn merge(&mut self, other: Config) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(relay_depth);
        take!(settle_delay);
        take!(tdc_timeout);
        take!(tdc_cadence);
        take!(control_period);
        take!(reference_period);
        take!(sample_period);
        take!(link_period);
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        fn env_u64(name: &str) -> Option<u64> {
            std::env::var(name).ok()?.parse().ok()
        }
        if let Some(v) = env_u64("FECTRL_RELAY_DEPTH") {
            self.relay_depth = Some(v as usize);
        }
        if let Some(v) = env_u64("FECTRL_SETTLE_DELAY") {
            self.settle_delay = Some(v);
        }
        if let Some(v) = env_u64("FECTRL_TDC_TIMEOUT") {
            self.tdc_timeout = Some(v);
        }
        if let Some(v) = env_u64("FECTRL_TDC_CADENCE") {
            self.tdc_cadence = Some(v);
        }
    }
}
