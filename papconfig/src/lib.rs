//! # PAPanel Configuration Module
//!
//! This module provides configuration management for PAPanel, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use papconfig::get_config;
//!
//! // Get the global configuration
//! let config = get_config();
//!
//! // Access configuration values
//! let base_url = config.get_device_base_url();
//! let poll = config.get_status_poll_secs()?;
//!
//! // Update configuration values
//! config.set_device_base_url("http://192.168.1.50".to_string())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("papanel.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PAPanel configuration"));
}

const ENV_CONFIG_DIR: &str = "PAPANEL_CONFIG";
const ENV_PREFIX: &str = "PAPANEL_CONFIG__";

// Default values for configuration
const DEFAULT_DEVICE_BASE_URL: &str = "http://192.168.4.1";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
const DEFAULT_STATUS_POLL_SECS: u64 = 2;
const DEFAULT_PLAYLIST_POLL_SECS: u64 = 5;
const DEFAULT_RESYNC_DELAY_SECS: u64 = 2;
const DEFAULT_VOLUME_DEBOUNCE_MS: u64 = 100;
const DEFAULT_VOLUME_MIN_DELTA: u64 = 2;
const DEFAULT_VOLUME_RECONCILE_THRESHOLD: u64 = 1;

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path)? {
                Value::Number(n) if n.is_u64() => Ok(n.as_u64().unwrap()),
                Value::Number(n) if n.is_i64() => Ok(n.as_i64().unwrap().max(0) as u64),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            let n = Number::from(value);
            self.set_value($path, Value::Number(n))
        }
    };
}

/// Configuration manager for PAPanel
///
/// This structure manages the panel configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// # Examples
///
/// ```no_run
/// use papconfig::get_config;
///
/// let config = get_config();
/// println!("Device: {}", config.get_device_base_url());
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(".papanel").exists() {
            return ".papanel".to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(".papanel");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        ".papanel".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("Le chemin spécifié n'est pas un répertoire"));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        // Test read permission
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PAPANEL_CONFIG` environment variable
    /// 3. `.papanel` in the current directory
    /// 4. `.papanel` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for
    /// read/write permissions.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created or validated
    pub fn config_dir(directory: &str) -> String {
        let dir_path = Self::find_config_dir(directory);
        let path = Path::new(&dir_path);

        Self::validate_config_dir(path)
            .expect("Impossible de valider le répertoire de configuration");

        dir_path
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory);
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        // Charger la configuration par défaut
        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        // Essayer de charger le fichier de configuration
        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        // Merger avec la config par défaut
        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        // Appliquer les overrides depuis les variables d'environnement
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["device", "base_url"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()?;
        Ok(())
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = path[0].to_lowercase();
            let key_value = Value::String(key);
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                let key_path = key
                    .trim_start_matches(ENV_PREFIX)
                    .split("__")
                    .collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        let new_key = Value::String(s.to_lowercase());
                        new_map.insert(new_key, Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    // ========================================================================
    // Typed accessors
    // ========================================================================

    /// Gets the device base URL
    ///
    /// Returns the configured URL, or the factory softAP address if the
    /// value is missing or not a string.
    pub fn get_device_base_url(&self) -> String {
        match self.get_value(&["device", "base_url"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            Ok(_) => {
                tracing::warn!(
                    "Device base URL is not a string or empty, using default {}",
                    DEFAULT_DEVICE_BASE_URL
                );
                DEFAULT_DEVICE_BASE_URL.to_string()
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to get device base URL: {}, using default {}",
                    err,
                    DEFAULT_DEVICE_BASE_URL
                );
                DEFAULT_DEVICE_BASE_URL.to_string()
            }
        }
    }

    /// Sets the device base URL
    pub fn set_device_base_url(&self, url: String) -> Result<()> {
        self.set_value(&["device", "base_url"], Value::String(url))
    }

    impl_u64_config!(
        get_request_timeout_secs,
        set_request_timeout_secs,
        &["device", "request_timeout_secs"],
        DEFAULT_REQUEST_TIMEOUT_SECS
    );

    impl_u64_config!(
        get_status_poll_secs,
        set_status_poll_secs,
        &["panel", "status_poll_secs"],
        DEFAULT_STATUS_POLL_SECS
    );

    impl_u64_config!(
        get_playlist_poll_secs,
        set_playlist_poll_secs,
        &["panel", "playlist_poll_secs"],
        DEFAULT_PLAYLIST_POLL_SECS
    );

    impl_u64_config!(
        get_resync_delay_secs,
        set_resync_delay_secs,
        &["panel", "resync_delay_secs"],
        DEFAULT_RESYNC_DELAY_SECS
    );

    impl_u64_config!(
        get_volume_debounce_ms,
        set_volume_debounce_ms,
        &["panel", "volume", "debounce_ms"],
        DEFAULT_VOLUME_DEBOUNCE_MS
    );

    impl_u64_config!(
        get_volume_min_delta,
        set_volume_min_delta,
        &["panel", "volume", "min_delta"],
        DEFAULT_VOLUME_MIN_DELTA
    );

    impl_u64_config!(
        get_volume_reconcile_threshold,
        set_volume_reconcile_threshold,
        &["panel", "volume", "reconcile_threshold"],
        DEFAULT_VOLUME_RECONCILE_THRESHOLD
    );
}

/// Returns the global configuration instance
///
/// This function provides access to the singleton configuration instance,
/// which is lazily loaded on first access.
///
/// # Examples
///
/// ```no_run
/// use papconfig::get_config;
///
/// let config = get_config();
/// println!("Polling every {}s", config.get_status_poll_secs()?);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// For mappings, keys from external are merged into default; scalars and
/// sequences from external replace the default values.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_yaml_overrides_scalars_and_keeps_defaults() {
        let mut default: Value =
            serde_yaml::from_str("device:\n  base_url: a\n  request_timeout_secs: 5\n").unwrap();
        let external: Value = serde_yaml::from_str("device:\n  base_url: b\n").unwrap();

        merge_yaml(&mut default, &external);

        let device = default.get("device").unwrap();
        assert_eq!(
            device.get("base_url").unwrap(),
            &Value::String("b".to_string())
        );
        // Non-overridden key keeps the default
        assert!(device.get("request_timeout_secs").is_some());
    }

    #[test]
    fn test_convert_env_value_types() {
        assert_eq!(Config::convert_env_value("42"), Value::Number(42.into()));
        assert_eq!(Config::convert_env_value("true"), Value::Bool(true));
        assert_eq!(
            Config::convert_env_value("hello world"),
            Value::String("hello world".to_string())
        );
    }

    #[test]
    fn test_default_config_parses() {
        let value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let value = Config::lower_keys_value(value);
        let device = value.get("device").unwrap();
        assert!(device.get("base_url").is_some());
        let panel = value.get("panel").unwrap();
        assert!(panel.get("status_poll_secs").is_some());
    }
}
