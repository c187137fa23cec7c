use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RmeConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub admission: AdmissionConfig,
    pub cooldown: CooldownConfig,
    pub stagnation: StagnationConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Weights and cut-offs for the merge decision.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Threshold used by the CLI when the caller does not pass one.
    pub base_threshold: f64,
    /// Lower bound on the relaxed base threshold (before emotional terms).
    pub threshold_floor: f64,
    pub stagnation_weight: f64,
    pub immaturity_weight: f64,
    /// Merges after which the store counts as fully mature.
    pub maturity_merges: u32,
    pub panic_weight: f64,
    pub joy_weight: f64,
    /// Fraction of the emotional term removed at full maturity.
    pub emotion_damping: f64,
    pub discharge_bonus: f64,
    pub discharge_panic: f64,
    /// Containment ratio with the last rejected set above which a loop is suspected.
    pub loop_similarity: f64,
    /// Consecutive blocks that must be exceeded before a loop is declared.
    pub loop_min_blocks: u32,
    pub loop_threshold: f64,
    pub strong_echo: f64,
    pub resonant_echo: f64,
    pub relaxed_fraction: f64,
    pub relaxed_echo: f64,
    pub joy_completion: f64,
    pub completion_floor: f64,
    pub panic_override: f64,
    pub panic_override_blocks: u32,
    pub stagnation_override: f64,
    pub discharge_override_panic: f64,
    pub urgent_tokens: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CooldownConfig {
    /// Cooldown window, in clock time units. Extended cooldowns last twice as long.
    pub ttl: f64,
    /// Rejected candidates go into cooldown once consecutive blocks exceed this.
    pub block_threshold: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StagnationConfig {
    pub window: usize,
    pub range_scale: f64,
    pub idle_after: f64,
    pub idle_boost: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReplayConfig {
    pub max_ngram: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_rme_dir()
            .join("engine.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            base_threshold: 0.05,
            threshold_floor: -0.15,
            stagnation_weight: 0.15,
            immaturity_weight: 0.1,
            maturity_merges: 30,
            panic_weight: 0.01,
            joy_weight: 0.03,
            emotion_damping: 0.5,
            discharge_bonus: 0.1,
            discharge_panic: 4.0,
            loop_similarity: 0.7,
            loop_min_blocks: 3,
            loop_threshold: -0.5,
            strong_echo: 0.5,
            resonant_echo: 0.2,
            relaxed_fraction: 0.25,
            relaxed_echo: 0.1,
            joy_completion: 3.0,
            completion_floor: -0.3,
            panic_override: 5.0,
            panic_override_blocks: 4,
            stagnation_override: 0.7,
            discharge_override_panic: 6.0,
            urgent_tokens: ["help", "scared", "feel", "need"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            ttl: 3.0,
            block_threshold: 2,
        }
    }
}

impl Default for StagnationConfig {
    fn default() -> Self {
        Self {
            window: 5,
            range_scale: 10.0,
            idle_after: 30.0,
            idle_boost: 0.3,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { max_ngram: 2 }
    }
}

/// Returns `~/.rme/`, or `./.rme/` when no home directory can be resolved.
pub fn default_rme_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rme")
}

/// Returns the default config file path: `~/.rme/config.toml`
pub fn default_config_path() -> PathBuf {
    default_rme_dir().join("config.toml")
}

impl RmeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RmeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (RME_DB, RME_LOG_LEVEL, RME_BASE_THRESHOLD).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RME_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("RME_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("RME_BASE_THRESHOLD") {
            match val.parse::<f64>() {
                Ok(t) => self.admission.base_threshold = t,
                Err(_) => warn!(value = %val, "ignoring non-numeric RME_BASE_THRESHOLD"),
            }
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RmeConfig::default();
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.admission.base_threshold, 0.05);
        assert_eq!(config.admission.threshold_floor, -0.15);
        assert_eq!(config.cooldown.ttl, 3.0);
        assert_eq!(config.stagnation.window, 5);
        assert_eq!(config.admission.urgent_tokens.len(), 4);
        assert!(config.storage.db_path.ends_with("engine.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[logging]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[admission]
loop_similarity = 0.8
urgent_tokens = ["sos"]

[cooldown]
ttl = 5.0
"#;
        let config: RmeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.admission.loop_similarity, 0.8);
        assert_eq!(config.admission.urgent_tokens, vec!["sos".to_string()]);
        assert_eq!(config.cooldown.ttl, 5.0);
        // defaults still apply for unset fields
        assert_eq!(config.admission.maturity_merges, 30);
        assert_eq!(config.cooldown.block_threshold, 2);
        assert_eq!(config.stagnation.idle_after, 30.0);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = RmeConfig::default();
        std::env::set_var("RME_DB", "/tmp/override.db");
        std::env::set_var("RME_LOG_LEVEL", "trace");
        std::env::set_var("RME_BASE_THRESHOLD", "0.2");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.logging.log_level, "trace");
        assert_eq!(config.admission.base_threshold, 0.2);

        // Clean up
        std::env::remove_var("RME_DB");
        std::env::remove_var("RME_LOG_LEVEL");
        std::env::remove_var("RME_BASE_THRESHOLD");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = RmeConfig::load_from("/nonexistent/rme/config.toml").unwrap();
        assert_eq!(config.replay.max_ngram, 2);
    }
}
