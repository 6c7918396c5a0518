//! Application paths and persisted settings
//!
//! Directory priority:
//! 1. CLI `--config-dir`
//! 2. `SEQCACHE_CONFIG_DIR` environment variable
//! 3. Current folder IF it already holds seqcache files
//! 4. Platform directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/seqcache/{name}, ~/.local/share/seqcache/{name}
//! - macOS: ~/Library/Application Support/seqcache/{name}
//! - Windows: %APPDATA%\seqcache\{name}

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::cache_man::CacheBudget;
use crate::core::orchestrator::OrchestratorConfig;
use crate::core::workers;
use crate::entities::speed::Speed;
use crate::utils::sequences::ListOptions;

pub const APP_NAME: &str = "seqcache";
pub const SETTINGS_FILE: &str = "seqcache.json";
pub const LOG_FILE: &str = "seqcache.log";
pub const CONFIG_DIR_ENV: &str = "SEQCACHE_CONFIG_DIR";

/// Overrides for the default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path of a configuration file
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Path of a data file (logs)
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Create configuration and data directories if missing
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }
    if data_dir != config_dir && !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }
    Ok(())
}

fn has_local_config_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Ok(current_dir) = std::env::current_dir()
        && has_local_config_files(&current_dir)
    {
        return current_dir;
    }
    platform
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir())
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir())
}

/// Cache sizing: explicit limits win over the system-memory fraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_items: Option<usize>,
    pub max_bytes: Option<usize>,
    /// Fraction of available memory (0.0-1.0)
    pub mem_fraction: f64,
    /// Memory kept free for the system, in GB
    pub reserve_gb: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_items: None,
            max_bytes: None,
            mem_fraction: 0.75,
            reserve_gb: 2.0,
        }
    }
}

impl CacheSettings {
    pub fn budget(&self) -> CacheBudget {
        match (self.max_items, self.max_bytes) {
            (Some(n), _) => CacheBudget::items(n),
            (None, Some(bytes)) => CacheBudget::bytes(bytes),
            (None, None) => CacheBudget::from_system(self.mem_fraction, self.reserve_gb),
        }
    }
}

/// Persisted settings (`seqcache.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub read_ahead: usize,
    pub read_behind: usize,
    /// Decode threads; 0 picks from the core count
    pub workers: usize,
    pub list: ListOptions,
    /// Default playback speed
    pub speed: Speed,
}

impl Default for Settings {
    fn default() -> Self {
        let window = OrchestratorConfig::default();
        Self {
            cache: CacheSettings::default(),
            read_ahead: window.ahead,
            read_behind: window.behind,
            workers: 0,
            list: ListOptions::default(),
            speed: Speed::default(),
        }
    }
}

impl Settings {
    /// Load from the config directory; a missing file yields defaults
    pub fn load(config: &PathConfig) -> Result<Self> {
        Self::load_from(&config_file(SETTINGS_FILE, config))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, config: &PathConfig) -> Result<PathBuf> {
        ensure_dirs(config)?;
        let path = config_file(SETTINGS_FILE, config);
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("Failed to write settings: {}", path.display()))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        if self.workers == 0 {
            workers::default_threads()
        } else {
            self.workers
        }
    }

    pub fn window(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            ahead: self.read_ahead,
            behind: self.read_behind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::sequence::Compress;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config_file("test.json", &config), PathBuf::from("/custom/test.json"));
        assert_eq!(data_file("x.log", &config), PathBuf::from("/custom/x.log"));
    }

    #[test]
    fn test_config_file_uses_app_name() {
        let path = config_file("test.json", &PathConfig::default());
        assert!(path.to_string_lossy().contains("test.json"));
    }

    #[test]
    fn test_settings_roundtrip_and_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = PathConfig {
            config_dir: Some(dir.path().to_path_buf()),
        };

        assert_eq!(Settings::load(&config).unwrap(), Settings::default());

        let mut settings = Settings::default();
        settings.read_ahead = 48;
        settings.list.compress = Compress::Range;
        settings.cache.max_items = Some(10);
        let path = settings.save(&config).unwrap();
        assert!(path.ends_with(SETTINGS_FILE));
        assert_eq!(Settings::load(&config).unwrap(), settings);

        // Missing keys fall back to defaults
        std::fs::write(&path, r#"{ "workers": 3 }"#).unwrap();
        let loaded = Settings::load(&config).unwrap();
        assert_eq!(loaded.worker_threads(), 3);
        assert_eq!(loaded.read_ahead, Settings::default().read_ahead);
    }

    #[test]
    fn test_zero_speed_in_settings_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "speed": { "num": 0, "den": 1 } }"#).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.speed, Speed::default());
        assert!(loaded.speed.frame_duration() > std::time::Duration::ZERO);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[test]
    fn test_cache_budget_priority() {
        let mut cache = CacheSettings::default();
        cache.max_bytes = Some(64 * 1024 * 1024);
        assert_eq!(cache.budget(), CacheBudget::Bytes(64 * 1024 * 1024));
        cache.max_items = Some(0);
        assert_eq!(cache.budget(), CacheBudget::Items(1));
    }
}
