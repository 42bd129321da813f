//! Pool configuration.
//!
//! A [`PoolConfigBuilder`] collects settings from code, property maps,
//! configuration files and environment variables. [`PoolConfigBuilder::build`]
//! turns it into an immutable [`PoolConfig`] that is shared by every
//! component of the pool and never mutated afterwards.
//!
//! Recognized property keys (defaults in parentheses):
//!
//! | key                          | default   |
//! |------------------------------|-----------|
//! | `exhaustedAction`            | `WAIT`    |
//! | `lifo`                       | `true`    |
//! | `maxActive`                  | `-1`      |
//! | `maxTotal`                   | `-1`      |
//! | `maxWait`                    | `-1`      |
//! | `maxIdle`                    | `-1`      |
//! | `minIdle`                    | `1`       |
//! | `numTestsPerEvictionRun`     | `3`       |
//! | `evictionIntervalMillis`     | `120000`  |
//! | `minEvictableIdleTimeMillis` | `1800000` |
//! | `testOnBorrow`               | `false`   |
//! | `testOnReturn`               | `false`   |
//! | `testOnIdle`                 | `true`    |
//!
//! The legacy spellings `whenExhaustedAction`, `timeBetweenEvictionRunsMillis`
//! and `testWhileIdle` are accepted as aliases.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{PoolError, Result};

/// Prefix of environment variables that override pool settings.
pub const ENV_PREFIX: &str = "CORRAL_POOL_";

/// What a borrow does when no connection can be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExhaustedAction {
    /// Fail immediately with [`PoolError::EndpointExhausted`].
    Fail,
    /// Block until a connection is released or `maxWait` elapses.
    #[default]
    Wait,
}

impl ExhaustedAction {
    /// Map the legacy numeric form (`0` = fail, `1` = wait).
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(ExhaustedAction::Fail),
            1 => Some(ExhaustedAction::Wait),
            _ => None,
        }
    }
}

impl fmt::Display for ExhaustedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustedAction::Fail => write!(f, "FAIL"),
            ExhaustedAction::Wait => write!(f, "WAIT"),
        }
    }
}

impl FromStr for ExhaustedAction {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        if let Ok(ordinal) = value.parse::<i64>() {
            return Self::from_ordinal(ordinal).ok_or_else(|| {
                PoolError::InvalidConfig(format!("unknown exhausted action ordinal {ordinal}"))
            });
        }
        match value.to_ascii_uppercase().as_str() {
            "FAIL" | "EXCEPTION" => Ok(ExhaustedAction::Fail),
            "WAIT" => Ok(ExhaustedAction::Wait),
            other => Err(PoolError::InvalidConfig(format!(
                "unknown exhausted action '{other}'"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ExhaustedAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Ordinal(i64),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Ordinal(ordinal) => Self::from_ordinal(ordinal).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown exhausted action ordinal {ordinal}"))
            }),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// Immutable configuration
// ============================================================================

/// Immutable pool settings.
///
/// Integer limits keep their configured sign: a non-positive `maxActive`,
/// `maxTotal` or `maxIdle` means unlimited, a negative `maxWait` means block
/// indefinitely. The `*_limit` accessors expose the decoded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    exhausted_action: ExhaustedAction,
    lifo: bool,
    max_active: i32,
    max_total: i32,
    max_wait: i64,
    max_idle: i32,
    min_idle: i32,
    num_tests_per_eviction_run: i32,
    eviction_interval_millis: i64,
    min_evictable_idle_time_millis: i64,
    test_on_borrow: bool,
    test_on_return: bool,
    test_on_idle: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfigBuilder::default().into_config()
    }
}

impl PoolConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Build a configuration from a property map, applying defaults for
    /// absent keys.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        PoolConfigBuilder::default()
            .with_properties(properties)
            .build()
    }

    /// A builder pre-populated with this configuration.
    pub fn to_builder(&self) -> PoolConfigBuilder {
        PoolConfigBuilder {
            exhausted_action: self.exhausted_action,
            lifo: self.lifo,
            max_active: self.max_active,
            max_total: self.max_total,
            max_wait: self.max_wait,
            max_idle: self.max_idle,
            min_idle: self.min_idle,
            num_tests_per_eviction_run: self.num_tests_per_eviction_run,
            eviction_interval_millis: self.eviction_interval_millis,
            min_evictable_idle_time_millis: self.min_evictable_idle_time_millis,
            test_on_borrow: self.test_on_borrow,
            test_on_return: self.test_on_return,
            test_on_idle: self.test_on_idle,
        }
    }

    pub fn exhausted_action(&self) -> ExhaustedAction {
        self.exhausted_action
    }

    pub fn lifo(&self) -> bool {
        self.lifo
    }

    pub fn max_active(&self) -> i32 {
        self.max_active
    }

    pub fn max_total(&self) -> i32 {
        self.max_total
    }

    pub fn max_wait_millis(&self) -> i64 {
        self.max_wait
    }

    pub fn max_idle(&self) -> i32 {
        self.max_idle
    }

    pub fn min_idle(&self) -> i32 {
        self.min_idle
    }

    pub fn num_tests_per_eviction_run(&self) -> i32 {
        self.num_tests_per_eviction_run
    }

    pub fn eviction_interval_millis(&self) -> i64 {
        self.eviction_interval_millis
    }

    pub fn min_evictable_idle_time_millis(&self) -> i64 {
        self.min_evictable_idle_time_millis
    }

    pub fn test_on_borrow(&self) -> bool {
        self.test_on_borrow
    }

    pub fn test_on_return(&self) -> bool {
        self.test_on_return
    }

    pub fn test_on_idle(&self) -> bool {
        self.test_on_idle
    }

    /// Per-endpoint cap on idle plus checked-out connections.
    pub fn max_active_limit(&self) -> Option<usize> {
        positive(self.max_active)
    }

    /// Cap on idle plus checked-out connections across all endpoints.
    pub fn max_total_limit(&self) -> Option<usize> {
        positive(self.max_total)
    }

    /// Per-endpoint cap on idle connections.
    pub fn max_idle_limit(&self) -> Option<usize> {
        positive(self.max_idle)
    }

    /// How long a WAIT borrow may block; `None` blocks indefinitely.
    pub fn max_wait(&self) -> Option<Duration> {
        u64::try_from(self.max_wait).ok().map(Duration::from_millis)
    }

    /// Period of the eviction scheduler; `None` disables it.
    pub fn eviction_interval(&self) -> Option<Duration> {
        positive_millis(self.eviction_interval_millis)
    }

    /// Idle age beyond which a connection is evicted; `None` disables
    /// idle-age eviction.
    pub fn min_evictable_idle_time(&self) -> Option<Duration> {
        positive_millis(self.min_evictable_idle_time_millis)
    }

    /// Number of idle connections inspected per endpoint per sweep.
    pub fn tests_per_eviction_run(&self) -> usize {
        usize::try_from(self.num_tests_per_eviction_run).unwrap_or(0)
    }

    /// The idle floor the scheduler tops up to, clamped by `maxIdle` and
    /// `maxActive`.
    pub fn effective_min_idle(&self) -> usize {
        let mut floor = usize::try_from(self.min_idle).unwrap_or(0);
        if let Some(max) = self.max_idle_limit() {
            floor = floor.min(max);
        }
        if let Some(max) = self.max_active_limit() {
            floor = floor.min(max);
        }
        floor
    }
}

fn positive(value: i32) -> Option<usize> {
    usize::try_from(value).ok().filter(|v| *v > 0)
}

fn positive_millis(millis: i64) -> Option<Duration> {
    u64::try_from(millis)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

// ============================================================================
// Builder
// ============================================================================

/// Mutable configuration used only while assembling a [`PoolConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PoolConfigBuilder {
    #[serde(alias = "whenExhaustedAction")]
    exhausted_action: ExhaustedAction,
    lifo: bool,
    max_active: i32,
    max_total: i32,
    max_wait: i64,
    max_idle: i32,
    min_idle: i32,
    num_tests_per_eviction_run: i32,
    #[serde(alias = "timeBetweenEvictionRunsMillis")]
    eviction_interval_millis: i64,
    min_evictable_idle_time_millis: i64,
    test_on_borrow: bool,
    test_on_return: bool,
    #[serde(alias = "testWhileIdle")]
    test_on_idle: bool,
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self {
            exhausted_action: ExhaustedAction::Wait,
            lifo: true,
            max_active: -1,
            max_total: -1,
            max_wait: -1,
            max_idle: -1,
            min_idle: 1,
            num_tests_per_eviction_run: 3,
            eviction_interval_millis: 120_000,
            min_evictable_idle_time_millis: 1_800_000,
            test_on_borrow: false,
            test_on_return: false,
            test_on_idle: true,
        }
    }
}

impl PoolConfigBuilder {
    /// Create a builder holding the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exhausted_action(mut self, action: ExhaustedAction) -> Self {
        self.exhausted_action = action;
        self
    }

    pub fn lifo(mut self, enabled: bool) -> Self {
        self.lifo = enabled;
        self
    }

    pub fn max_active(mut self, max: i32) -> Self {
        self.max_active = max;
        self
    }

    pub fn max_total(mut self, max: i32) -> Self {
        self.max_total = max;
        self
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = duration_millis(wait);
        self
    }

    /// Raw form of [`max_wait`](Self::max_wait); negative blocks indefinitely.
    pub fn max_wait_millis(mut self, millis: i64) -> Self {
        self.max_wait = millis;
        self
    }

    pub fn max_idle(mut self, max: i32) -> Self {
        self.max_idle = max;
        self
    }

    pub fn min_idle(mut self, min: i32) -> Self {
        self.min_idle = min;
        self
    }

    pub fn num_tests_per_eviction_run(mut self, tests: i32) -> Self {
        self.num_tests_per_eviction_run = tests;
        self
    }

    pub fn eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval_millis = duration_millis(interval);
        self
    }

    /// Raw form of [`eviction_interval`](Self::eviction_interval); non-positive
    /// disables the scheduler.
    pub fn eviction_interval_millis(mut self, millis: i64) -> Self {
        self.eviction_interval_millis = millis;
        self
    }

    pub fn min_evictable_idle_time(mut self, idle: Duration) -> Self {
        self.min_evictable_idle_time_millis = duration_millis(idle);
        self
    }

    pub fn min_evictable_idle_time_millis(mut self, millis: i64) -> Self {
        self.min_evictable_idle_time_millis = millis;
        self
    }

    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    pub fn test_on_return(mut self, enabled: bool) -> Self {
        self.test_on_return = enabled;
        self
    }

    pub fn test_on_idle(mut self, enabled: bool) -> Self {
        self.test_on_idle = enabled;
        self
    }

    /// Apply recognized keys from a property map.
    ///
    /// Values go through `${VAR}` environment expansion first. Unknown keys
    /// are ignored; values that do not parse are logged and leave the
    /// current setting untouched.
    pub fn with_properties(mut self, properties: &HashMap<String, String>) -> Self {
        for (key, raw) in properties {
            let Some(option) = PoolOption::lookup(key) else {
                trace!(key = %key, "Ignoring unrecognized pool property");
                continue;
            };
            let value = expand(raw);
            if let Err(e) = self.apply(option, &value) {
                warn!(key = %key, value = %value, error = %e, "Ignoring invalid pool property");
            }
        }
        self
    }

    /// Apply `CORRAL_POOL_*` environment variables (e.g. `CORRAL_POOL_MAX_ACTIVE`).
    pub fn with_env_overrides(mut self) -> Self {
        for option in PoolOption::ALL {
            let var = option.env_var();
            if let Ok(value) = std::env::var(&var) {
                if let Err(e) = self.apply(option, &value) {
                    warn!(var = %var, value = %value, error = %e, "Ignoring invalid environment override");
                }
            }
        }
        self
    }

    /// Load settings from a file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.json`,
    /// `.properties` (`key=value` lines), anything else is read as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| PoolError::config_load(path, e))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|e| PoolError::config_load(path, e))
            }
            "json" => serde_json::from_str(&content).map_err(|e| PoolError::config_load(path, e)),
            "properties" => Ok(Self::default().with_properties(&parse_properties(&content))),
            _ => toml::from_str(&content).map_err(|e| PoolError::config_load(path, e)),
        }
    }

    /// Load from the explicit path, or the first existing default location,
    /// then apply environment overrides.
    ///
    /// Default locations are `./corral.toml` and `<config dir>/corral/pool.toml`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let builder = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_paths().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    debug!(path = %path.display(), "Loading pool configuration");
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        Ok(builder.with_env_overrides())
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("corral.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("corral").join("pool.toml"));
        }
        paths
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<PoolConfig> {
        if self.num_tests_per_eviction_run < 0 {
            return Err(PoolError::InvalidConfig(format!(
                "numTestsPerEvictionRun must not be negative (got {})",
                self.num_tests_per_eviction_run
            )));
        }
        if self.max_active > 0 && self.min_idle > self.max_active {
            warn!(
                min_idle = self.min_idle,
                max_active = self.max_active,
                "minIdle exceeds maxActive; idle top-up stops at maxActive"
            );
        }
        if self.max_idle > 0 && self.min_idle > self.max_idle {
            warn!(
                min_idle = self.min_idle,
                max_idle = self.max_idle,
                "minIdle exceeds maxIdle; idle top-up stops at maxIdle"
            );
        }
        Ok(self.into_config())
    }

    fn into_config(self) -> PoolConfig {
        PoolConfig {
            exhausted_action: self.exhausted_action,
            lifo: self.lifo,
            max_active: self.max_active,
            max_total: self.max_total,
            max_wait: self.max_wait,
            max_idle: self.max_idle,
            min_idle: self.min_idle,
            num_tests_per_eviction_run: self.num_tests_per_eviction_run,
            eviction_interval_millis: self.eviction_interval_millis,
            min_evictable_idle_time_millis: self.min_evictable_idle_time_millis,
            test_on_borrow: self.test_on_borrow,
            test_on_return: self.test_on_return,
            test_on_idle: self.test_on_idle,
        }
    }

    fn apply(&mut self, option: PoolOption, value: &str) -> Result<()> {
        let value = value.trim();
        match option {
            PoolOption::ExhaustedAction => self.exhausted_action = value.parse()?,
            PoolOption::Lifo => self.lifo = parse_bool(option, value)?,
            PoolOption::MaxActive => self.max_active = parse_number(option, value)?,
            PoolOption::MaxTotal => self.max_total = parse_number(option, value)?,
            PoolOption::MaxWait => self.max_wait = parse_number(option, value)?,
            PoolOption::MaxIdle => self.max_idle = parse_number(option, value)?,
            PoolOption::MinIdle => self.min_idle = parse_number(option, value)?,
            PoolOption::NumTestsPerEvictionRun => {
                self.num_tests_per_eviction_run = parse_number(option, value)?;
            }
            PoolOption::EvictionIntervalMillis => {
                self.eviction_interval_millis = parse_number(option, value)?;
            }
            PoolOption::MinEvictableIdleTimeMillis => {
                self.min_evictable_idle_time_millis = parse_number(option, value)?;
            }
            PoolOption::TestOnBorrow => self.test_on_borrow = parse_bool(option, value)?,
            PoolOption::TestOnReturn => self.test_on_return = parse_bool(option, value)?,
            PoolOption::TestOnIdle => self.test_on_idle = parse_bool(option, value)?,
        }
        Ok(())
    }
}

// ============================================================================
// Property keys
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolOption {
    ExhaustedAction,
    Lifo,
    MaxActive,
    MaxTotal,
    MaxWait,
    MaxIdle,
    MinIdle,
    NumTestsPerEvictionRun,
    EvictionIntervalMillis,
    MinEvictableIdleTimeMillis,
    TestOnBorrow,
    TestOnReturn,
    TestOnIdle,
}

impl PoolOption {
    const ALL: [PoolOption; 13] = [
        PoolOption::ExhaustedAction,
        PoolOption::Lifo,
        PoolOption::MaxActive,
        PoolOption::MaxTotal,
        PoolOption::MaxWait,
        PoolOption::MaxIdle,
        PoolOption::MinIdle,
        PoolOption::NumTestsPerEvictionRun,
        PoolOption::EvictionIntervalMillis,
        PoolOption::MinEvictableIdleTimeMillis,
        PoolOption::TestOnBorrow,
        PoolOption::TestOnReturn,
        PoolOption::TestOnIdle,
    ];

    fn key(self) -> &'static str {
        match self {
            PoolOption::ExhaustedAction => "exhaustedAction",
            PoolOption::Lifo => "lifo",
            PoolOption::MaxActive => "maxActive",
            PoolOption::MaxTotal => "maxTotal",
            PoolOption::MaxWait => "maxWait",
            PoolOption::MaxIdle => "maxIdle",
            PoolOption::MinIdle => "minIdle",
            PoolOption::NumTestsPerEvictionRun => "numTestsPerEvictionRun",
            PoolOption::EvictionIntervalMillis => "evictionIntervalMillis",
            PoolOption::MinEvictableIdleTimeMillis => "minEvictableIdleTimeMillis",
            PoolOption::TestOnBorrow => "testOnBorrow",
            PoolOption::TestOnReturn => "testOnReturn",
            PoolOption::TestOnIdle => "testOnIdle",
        }
    }

    fn legacy_key(self) -> Option<&'static str> {
        match self {
            PoolOption::ExhaustedAction => Some("whenExhaustedAction"),
            PoolOption::EvictionIntervalMillis => Some("timeBetweenEvictionRunsMillis"),
            PoolOption::TestOnIdle => Some("testWhileIdle"),
            _ => None,
        }
    }

    fn lookup(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|o| o.key() == key || o.legacy_key() == Some(key))
    }

    fn env_var(self) -> String {
        format!("{}{}", ENV_PREFIX, screaming_snake(self.key()))
    }
}

fn screaming_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

fn expand(raw: &str) -> String {
    match shellexpand::env(raw) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            debug!(value = %raw, error = %e, "Leaving pool property unexpanded");
            raw.to_string()
        }
    }
}

fn parse_number<T>(option: PoolOption, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e| {
        PoolError::InvalidConfig(format!("{}: '{}' is not a number ({})", option.key(), value, e))
    })
}

fn parse_bool(option: PoolOption, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(PoolError::InvalidConfig(format!(
            "{}: '{}' is not a boolean",
            option.key(),
            value
        ))),
    }
}

/// Parse Java-style `key=value` / `key: value` lines. `#` and `!` start comments.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let (key, value) = line.split_at(split);
            Some((key.trim().to_string(), value[1..].trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.exhausted_action(), ExhaustedAction::Wait);
        assert!(config.lifo());
        assert_eq!(config.max_active(), -1);
        assert_eq!(config.max_total(), -1);
        assert_eq!(config.max_wait_millis(), -1);
        assert_eq!(config.max_idle(), -1);
        assert_eq!(config.min_idle(), 1);
        assert_eq!(config.num_tests_per_eviction_run(), 3);
        assert_eq!(config.eviction_interval_millis(), 120_000);
        assert_eq!(config.min_evictable_idle_time_millis(), 1_800_000);
        assert!(!config.test_on_borrow());
        assert!(!config.test_on_return());
        assert!(config.test_on_idle());
    }

    #[test]
    fn test_decoded_limits() {
        let config = PoolConfig::default();
        assert_eq!(config.max_active_limit(), None);
        assert_eq!(config.max_total_limit(), None);
        assert_eq!(config.max_idle_limit(), None);
        assert_eq!(config.max_wait(), None);
        assert_eq!(config.eviction_interval(), Some(Duration::from_secs(120)));
        assert_eq!(config.min_evictable_idle_time(), Some(Duration::from_secs(1800)));

        let config = PoolConfig::builder()
            .max_active(0)
            .max_wait_millis(0)
            .eviction_interval_millis(0)
            .min_evictable_idle_time_millis(-5)
            .build()
            .unwrap();
        assert_eq!(config.max_active_limit(), None);
        assert_eq!(config.max_wait(), Some(Duration::ZERO));
        assert_eq!(config.eviction_interval(), None);
        assert_eq!(config.min_evictable_idle_time(), None);
    }

    #[test]
    fn test_builder_setters() {
        let config = PoolConfig::builder()
            .exhausted_action(ExhaustedAction::Fail)
            .lifo(false)
            .max_active(4)
            .max_total(10)
            .max_wait(Duration::from_millis(250))
            .max_idle(2)
            .min_idle(1)
            .num_tests_per_eviction_run(5)
            .eviction_interval(Duration::from_secs(1))
            .min_evictable_idle_time(Duration::from_secs(2))
            .test_on_borrow(true)
            .test_on_return(true)
            .test_on_idle(false)
            .build()
            .unwrap();

        assert_eq!(config.exhausted_action(), ExhaustedAction::Fail);
        assert!(!config.lifo());
        assert_eq!(config.max_active_limit(), Some(4));
        assert_eq!(config.max_total_limit(), Some(10));
        assert_eq!(config.max_wait(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_idle_limit(), Some(2));
        assert_eq!(config.tests_per_eviction_run(), 5);
        assert_eq!(config.eviction_interval_millis(), 1000);
        assert_eq!(config.min_evictable_idle_time_millis(), 2000);
        assert!(config.test_on_borrow());
        assert!(config.test_on_return());
        assert!(!config.test_on_idle());
    }

    #[test]
    fn test_to_builder_round_trip() {
        let config = PoolConfig::builder()
            .max_active(7)
            .lifo(false)
            .build()
            .unwrap();
        let copy = config.to_builder().build().unwrap();
        assert_eq!(config, copy);
    }

    #[test]
    fn test_negative_tests_per_run_rejected() {
        let result = PoolConfig::builder().num_tests_per_eviction_run(-1).build();
        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn test_effective_min_idle() {
        let config = PoolConfig::builder().min_idle(5).max_active(3).build().unwrap();
        assert_eq!(config.effective_min_idle(), 3);

        let config = PoolConfig::builder().min_idle(5).max_idle(2).build().unwrap();
        assert_eq!(config.effective_min_idle(), 2);

        let config = PoolConfig::builder().min_idle(-1).build().unwrap();
        assert_eq!(config.effective_min_idle(), 0);
    }

    #[test]
    fn test_properties_subset() {
        let config = PoolConfig::from_properties(&props(&[
            ("maxActive", "8"),
            ("lifo", "false"),
            ("testOnBorrow", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.max_active(), 8);
        assert!(!config.lifo());
        assert!(config.test_on_borrow());
        assert_eq!(config.max_total(), -1);
        assert_eq!(config.min_idle(), 1);
        assert_eq!(config.exhausted_action(), ExhaustedAction::Wait);
    }

    #[test]
    fn test_legacy_property_keys() {
        let config = PoolConfig::from_properties(&props(&[
            ("whenExhaustedAction", "0"),
            ("timeBetweenEvictionRunsMillis", "500"),
            ("testWhileIdle", "false"),
        ]))
        .unwrap();

        assert_eq!(config.exhausted_action(), ExhaustedAction::Fail);
        assert_eq!(config.eviction_interval_millis(), 500);
        assert!(!config.test_on_idle());
    }

    #[test]
    fn test_invalid_property_keeps_default() {
        let config = PoolConfig::from_properties(&props(&[
            ("maxActive", "lots"),
            ("lifo", "maybe"),
            ("exhaustedAction", "2"),
            ("unknownKey", "1"),
        ]))
        .unwrap();

        assert_eq!(config.max_active(), -1);
        assert!(config.lifo());
        assert_eq!(config.exhausted_action(), ExhaustedAction::Wait);
    }

    #[test]
    fn test_exhausted_action_parse() {
        assert_eq!("fail".parse::<ExhaustedAction>().unwrap(), ExhaustedAction::Fail);
        assert_eq!("EXCEPTION".parse::<ExhaustedAction>().unwrap(), ExhaustedAction::Fail);
        assert_eq!(" Wait ".parse::<ExhaustedAction>().unwrap(), ExhaustedAction::Wait);
        assert_eq!("1".parse::<ExhaustedAction>().unwrap(), ExhaustedAction::Wait);
        assert!("grow".parse::<ExhaustedAction>().is_err());
        assert_eq!(ExhaustedAction::Fail.to_string(), "FAIL");
    }

    #[test]
    fn test_toml_builder() {
        let builder: PoolConfigBuilder = toml::from_str(
            r#"
            exhaustedAction = "FAIL"
            maxActive = 3
            minEvictableIdleTimeMillis = 60000
            "#,
        )
        .unwrap();
        let config = builder.build().unwrap();
        assert_eq!(config.exhausted_action(), ExhaustedAction::Fail);
        assert_eq!(config.max_active(), 3);
        assert_eq!(config.min_evictable_idle_time_millis(), 60_000);
        assert_eq!(config.num_tests_per_eviction_run(), 3);
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let result: std::result::Result<PoolConfigBuilder, _> = toml::from_str("maxActiv = 3");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_properties() {
        let parsed = parse_properties(
            "# pool settings\nmaxActive = 4\n! legacy comment\nlifo: false\n\nbroken line\n",
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("maxActive").map(String::as_str), Some("4"));
        assert_eq!(parsed.get("lifo").map(String::as_str), Some("false"));
    }

    #[test]
    fn test_env_var_names() {
        assert_eq!(PoolOption::MaxActive.env_var(), "CORRAL_POOL_MAX_ACTIVE");
        assert_eq!(
            PoolOption::MinEvictableIdleTimeMillis.env_var(),
            "CORRAL_POOL_MIN_EVICTABLE_IDLE_TIME_MILLIS"
        );
        assert_eq!(PoolOption::Lifo.env_var(), "CORRAL_POOL_LIFO");
    }
}
