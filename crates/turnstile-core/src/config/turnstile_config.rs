//! Top-level Turnstile configuration with 4-layer resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    AntiPassbackSettings, CacheConfig, CapacitySettings, DispatchConfig, EngineConfig, TtlPolicy,
};
use crate::errors::ConfigError;
use crate::models::PolicyKind;

/// Project-level config file name.
pub const PROJECT_CONFIG_FILE: &str = "turnstile.toml";

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. Environment variables (`TURNSTILE_*`)
/// 2. Project config (`turnstile.toml` in the project root)
/// 3. User config (`~/.turnstile/config.toml`)
/// 4. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TurnstileConfig {
    pub cache: CacheConfig,
    pub anti_passback: AntiPassbackSettings,
    pub capacity: CapacitySettings,
    pub engine: EngineConfig,
    pub dispatch: DispatchConfig,
}

impl TurnstileConfig {
    /// Load configuration with 4-layer resolution rooted at `root`.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Layer 3 (lowest priority): user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        // Layer 2: project config
        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        // Layer 1 (highest priority): environment variables
        Self::apply_env_overrides(&mut config);

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &TurnstileConfig) -> Result<(), ConfigError> {
        fn positive<T: PartialEq + Default>(
            value: Option<T>,
            field: &str,
        ) -> Result<(), ConfigError> {
            match value {
                Some(v) if v == T::default() => Err(ConfigError::ValidationFailed {
                    field: field.to_string(),
                    message: "must be greater than 0".to_string(),
                }),
                _ => Ok(()),
            }
        }

        positive(config.cache.max_entries, "cache.max_entries")?;
        positive(config.anti_passback.cache_ttl_secs, "anti_passback.cache_ttl_secs")?;
        positive(config.anti_passback.history_limit, "anti_passback.history_limit")?;
        positive(config.anti_passback.cas_retries, "anti_passback.cas_retries")?;
        positive(config.capacity.cas_retries, "capacity.cas_retries")?;
        positive(config.engine.latency_budget_ms, "engine.latency_budget_ms")?;
        positive(config.dispatch.queue_capacity, "dispatch.queue_capacity")?;
        positive(config.dispatch.workers, "dispatch.workers")?;
        positive(config.dispatch.record_limit, "dispatch.record_limit")?;

        if let Some(ratio) = config.capacity.warning_ceiling_ratio {
            if !ratio.is_finite() || ratio < 1.0 {
                return Err(ConfigError::ValidationFailed {
                    field: "capacity.warning_ceiling_ratio".to_string(),
                    message: "must be a finite number >= 1.0".to_string(),
                });
            }
        }
        if let Some(ref names) = config.engine.enabled_policies {
            if let Some(unknown) = names.iter().find(|n| PolicyKind::parse(n).is_none()) {
                return Err(ConfigError::ValidationFailed {
                    field: "engine.enabled_policies".to_string(),
                    message: format!("unknown policy '{unknown}'"),
                });
            }
        }
        Ok(())
    }

    /// Returns the user config path: `~/.turnstile/config.toml`.
    fn user_config_path() -> Option<PathBuf> {
        dirs_path().map(|d| d.join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored.
    fn merge_toml_file(config: &mut TurnstileConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: TurnstileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins wherever it has a value.
    pub fn merge(base: &mut TurnstileConfig, other: &TurnstileConfig) {
        fn take<T: Clone>(base: &mut Option<T>, other: &Option<T>) {
            if other.is_some() {
                base.clone_from(other);
            }
        }

        take(&mut base.cache.max_entries, &other.cache.max_entries);

        take(&mut base.anti_passback.cache_ttl_secs, &other.anti_passback.cache_ttl_secs);
        take(&mut base.anti_passback.ttl_policy, &other.anti_passback.ttl_policy);
        take(&mut base.anti_passback.history_limit, &other.anti_passback.history_limit);
        take(&mut base.anti_passback.cas_retries, &other.anti_passback.cas_retries);

        take(
            &mut base.capacity.warning_ceiling_ratio,
            &other.capacity.warning_ceiling_ratio,
        );
        take(&mut base.capacity.cas_retries, &other.capacity.cas_retries);

        take(&mut base.engine.latency_budget_ms, &other.engine.latency_budget_ms);
        take(&mut base.engine.enabled_policies, &other.engine.enabled_policies);

        take(&mut base.dispatch.queue_capacity, &other.dispatch.queue_capacity);
        take(&mut base.dispatch.workers, &other.dispatch.workers);
        take(&mut base.dispatch.retry_once, &other.dispatch.retry_once);
        take(&mut base.dispatch.record_limit, &other.dispatch.record_limit);
    }

    /// Apply environment variable overrides.
    /// Pattern: `TURNSTILE_<SECTION>_<FIELD>`, e.g. `TURNSTILE_ENGINE_LATENCY_BUDGET_MS`.
    /// Unparseable values are ignored.
    fn apply_env_overrides(config: &mut TurnstileConfig) {
        fn env<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = env("TURNSTILE_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = Some(v);
        }
        if let Some(v) = env("TURNSTILE_ANTI_PASSBACK_CACHE_TTL_SECS") {
            config.anti_passback.cache_ttl_secs = Some(v);
        }
        if let Ok(val) = std::env::var("TURNSTILE_ANTI_PASSBACK_TTL_POLICY") {
            match val.trim().to_ascii_lowercase().as_str() {
                "fixed" => config.anti_passback.ttl_policy = Some(TtlPolicy::Fixed),
                "window" => config.anti_passback.ttl_policy = Some(TtlPolicy::Window),
                _ => {}
            }
        }
        if let Some(v) = env("TURNSTILE_ANTI_PASSBACK_HISTORY_LIMIT") {
            config.anti_passback.history_limit = Some(v);
        }
        if let Some(v) = env("TURNSTILE_CAPACITY_WARNING_CEILING_RATIO") {
            config.capacity.warning_ceiling_ratio = Some(v);
        }
        if let Some(v) = env("TURNSTILE_ENGINE_LATENCY_BUDGET_MS") {
            config.engine.latency_budget_ms = Some(v);
        }
        if let Ok(val) = std::env::var("TURNSTILE_ENGINE_ENABLED_POLICIES") {
            config.engine.enabled_policies = Some(
                val.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
        if let Some(v) = env("TURNSTILE_DISPATCH_QUEUE_CAPACITY") {
            config.dispatch.queue_capacity = Some(v);
        }
        if let Some(v) = env("TURNSTILE_DISPATCH_WORKERS") {
            config.dispatch.workers = Some(v);
        }
        if let Some(v) = env("TURNSTILE_DISPATCH_RETRY_ONCE") {
            config.dispatch.retry_once = Some(v);
        }
        if let Some(v) = env("TURNSTILE_DISPATCH_RECORD_LIMIT") {
            config.dispatch.record_limit = Some(v);
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

/// Returns the user-level config directory: `~/.turnstile/`.
fn dirs_path() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".turnstile"))
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
