use crate::Result;
use anyhow::{Context, anyhow};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// TOML configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub place: PlaceConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub sensing: SensingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub password: String,
    /// Login endpoints tried in order; the first that accepts wins.
    #[serde(default = "default_auth_strategies")]
    pub auth_strategies: Vec<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Empty `id` means every place flagged active in the store.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlaceConfig {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_tree_count")]
    pub tree_count: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_business_start_hour")]
    pub business_start_hour: u32,
    #[serde(default = "default_business_end_hour")]
    pub business_end_hour: u32,
    #[serde(default = "default_floor_min_fraction")]
    pub floor_min_fraction: f64,
    #[serde(default = "default_floor_max_fraction")]
    pub floor_max_fraction: f64,
    #[serde(default = "default_floor_seed")]
    pub floor_seed: u64,
    #[serde(default = "default_capacity")]
    pub default_capacity: u32,
    #[serde(default = "default_interpretation_offset")]
    pub interpretation_offset: String,
    #[serde(default = "default_cron_schedule")]
    pub cron_schedule: String,
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sensing_interval")]
    pub interval: String,
    #[serde(default = "default_warmup_skip_count")]
    pub warmup_skip_count: u32,
    #[serde(default = "default_gas_history_len")]
    pub gas_history_len: usize,
    #[serde(default = "default_sensing_source")]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_rust_log_format")]
    pub rust_log_format: String,
}

// Default values
fn default_store_base_url() -> String {
    "http://127.0.0.1:8090".to_string()
}
fn default_auth_strategies() -> Vec<String> {
    vec![
        "superuser".to_string(),
        "admin".to_string(),
        "user".to_string(),
    ]
}
fn default_timeout_seconds() -> u64 {
    10
}
fn default_page_size() -> u32 {
    500
}
fn default_lookback_days() -> u32 {
    30
}
fn default_tree_count() -> u32 {
    50
}
fn default_seed() -> u64 {
    42
}
fn default_business_start_hour() -> u32 {
    8
}
fn default_business_end_hour() -> u32 {
    19
}
fn default_floor_min_fraction() -> f64 {
    0.15
}
fn default_floor_max_fraction() -> f64 {
    0.25
}
fn default_floor_seed() -> u64 {
    7
}
fn default_capacity() -> u32 {
    5
}
fn default_interpretation_offset() -> String {
    "+00:00".to_string()
}
fn default_cron_schedule() -> String {
    "0 0 0 * * *".to_string()
}
fn default_run_on_startup() -> bool {
    true
}
fn default_sensing_interval() -> String {
    "5s".to_string()
}
fn default_warmup_skip_count() -> u32 {
    30
}
fn default_gas_history_len() -> usize {
    10
}
fn default_sensing_source() -> String {
    "synthetic".to_string()
}
fn default_rust_log_format() -> String {
    "json".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
            identity: String::new(),
            password: String::new(),
            auth_strategies: default_auth_strategies(),
            timeout_seconds: default_timeout_seconds(),
            page_size: default_page_size(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            tree_count: default_tree_count(),
            seed: default_seed(),
            business_start_hour: default_business_start_hour(),
            business_end_hour: default_business_end_hour(),
            floor_min_fraction: default_floor_min_fraction(),
            floor_max_fraction: default_floor_max_fraction(),
            floor_seed: default_floor_seed(),
            default_capacity: default_capacity(),
            interpretation_offset: default_interpretation_offset(),
            cron_schedule: default_cron_schedule(),
            run_on_startup: default_run_on_startup(),
        }
    }
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_sensing_interval(),
            warmup_skip_count: default_warmup_skip_count(),
            gas_history_len: default_gas_history_len(),
            source: default_sensing_source(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log_format: default_rust_log_format(),
        }
    }
}

static CONFIG: Lazy<Config> = Lazy::new(|| {
    load_config().unwrap_or_else(|e| {
        eprintln!(
            "Warning: Failed to load config files: {}. Using defaults.",
            e
        );
        Config::default()
    })
});

static CONFIG_STORE: Lazy<Arc<Mutex<HashMap<String, String>>>> =
    Lazy::new(|| Arc::new(Mutex::new(HashMap::new())));

pub fn config() -> &'static Config {
    &CONFIG
}

pub fn get(name: &str) -> Result<String> {
    // Priority 1: CONFIG_STORE (runtime overrides)
    if let Some(value) = get_from_store(name) {
        if value.is_empty() {
            return Err(anyhow!("{} is empty", name));
        }
        return Ok(value);
    }

    // Priority 2: Environment variables
    if let Ok(val) = std::env::var(name)
        && !val.is_empty()
    {
        return Ok(val);
    }

    // Priority 3: TOML config
    if let Some(value) = toml_value(&CONFIG, name)
        && !value.is_empty()
    {
        return Ok(value);
    }

    Err(anyhow!("Configuration key not found: {}", name))
}

/// `get` followed by `FromStr`, naming the key on failure.
pub fn get_parsed<T>(name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(name)?;
    raw.parse::<T>()
        .map_err(|e| anyhow!("invalid value for {}: {:?}: {}", name, raw, e))
}

/// Duration keys are humantime strings such as `5s` or `1m 30s`.
pub fn get_duration(name: &str) -> Result<Duration> {
    let raw = get(name)?;
    humantime::parse_duration(&raw).with_context(|| format!("invalid duration for {}", name))
}

fn toml_value(config: &Config, name: &str) -> Option<String> {
    match name {
        "STORE_BASE_URL" => Some(config.store.base_url.clone()),
        "STORE_IDENTITY" => Some(config.store.identity.clone()),
        "STORE_PASSWORD" => Some(config.store.password.clone()),
        "STORE_AUTH_STRATEGIES" => Some(config.store.auth_strategies.join(",")),
        "STORE_TIMEOUT_SECONDS" => Some(config.store.timeout_seconds.to_string()),
        "STORE_PAGE_SIZE" => Some(config.store.page_size.to_string()),
        "PLACE_ID" => Some(config.place.id.clone()),
        "FORECAST_LOOKBACK_DAYS" => Some(config.forecast.lookback_days.to_string()),
        "FORECAST_TREE_COUNT" => Some(config.forecast.tree_count.to_string()),
        "FORECAST_SEED" => Some(config.forecast.seed.to_string()),
        "FORECAST_BUSINESS_START_HOUR" => Some(config.forecast.business_start_hour.to_string()),
        "FORECAST_BUSINESS_END_HOUR" => Some(config.forecast.business_end_hour.to_string()),
        "FORECAST_FLOOR_MIN_FRACTION" => Some(config.forecast.floor_min_fraction.to_string()),
        "FORECAST_FLOOR_MAX_FRACTION" => Some(config.forecast.floor_max_fraction.to_string()),
        "FORECAST_FLOOR_SEED" => Some(config.forecast.floor_seed.to_string()),
        "FORECAST_DEFAULT_CAPACITY" => Some(config.forecast.default_capacity.to_string()),
        "FORECAST_INTERPRETATION_OFFSET" => Some(config.forecast.interpretation_offset.clone()),
        "FORECAST_CRON_SCHEDULE" => Some(config.forecast.cron_schedule.clone()),
        "FORECAST_RUN_ON_STARTUP" => Some(config.forecast.run_on_startup.to_string()),
        "SENSING_ENABLED" => Some(config.sensing.enabled.to_string()),
        "SENSING_INTERVAL" => Some(config.sensing.interval.clone()),
        "SENSING_WARMUP_SKIP_COUNT" => Some(config.sensing.warmup_skip_count.to_string()),
        "SENSING_GAS_HISTORY_LEN" => Some(config.sensing.gas_history_len.to_string()),
        "SENSING_SOURCE" => Some(config.sensing.source.clone()),
        "RUST_LOG_FORMAT" => Some(config.logging.rust_log_format.clone()),
        _ => None,
    }
}

/// Test hook: overrides a configuration value.
///
/// Public (not `#[cfg(test)]`) so tests in downstream crates can use it.
#[doc(hidden)]
pub fn set(name: &str, value: &str) {
    if let Ok(mut store) = CONFIG_STORE.lock() {
        store.insert(name.to_string(), value.to_string());
    }
}

#[doc(hidden)]
pub fn remove(name: &str) {
    if let Ok(mut store) = CONFIG_STORE.lock() {
        store.remove(name);
    }
}

/// Sets a CONFIG_STORE value and restores the previous one on drop, even if
/// the test panics.
#[doc(hidden)]
pub struct ConfigGuard {
    key: String,
    previous: Option<String>,
}

impl ConfigGuard {
    pub fn new(key: &str, value: &str) -> Self {
        let previous = get_from_store(key);
        set(key, value);
        Self {
            key: key.to_string(),
            previous,
        }
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(prev) => set(&self.key, prev),
            None => remove(&self.key),
        }
    }
}

fn get_from_store(name: &str) -> Option<String> {
    if let Ok(store) = CONFIG_STORE.lock() {
        store.get(name).cloned()
    } else {
        None
    }
}

/// Load configuration from TOML files with priority:
/// 1. config/config.local.toml (git-ignored, for local overrides)
/// 2. config/config.toml (git-managed template)
/// 3. Default values
fn load_config() -> Result<Config> {
    load_config_from(Path::new("config/config.toml"), Path::new("config/config.local.toml"))
}

fn load_config_from(base_path: &Path, local_path: &Path) -> Result<Config> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in [base_path, local_path] {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let value: toml::Value = toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            merge_value(&mut merged, value);
        }
    }

    Ok(merged.try_into::<Config>()?)
}

/// Deep merge: tables merge key by key, anything else in `local` replaces `base`.
fn merge_value(base: &mut toml::Value, local: toml::Value) {
    match (base, local) {
        (toml::Value::Table(base_table), toml::Value::Table(local_table)) => {
            for (key, value) in local_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, local) => *base = local,
    }
}
