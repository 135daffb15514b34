//! Environment variable access
//!
//! Unset variables are `Ok(None)`. A variable that is set but unusable
//! (not UTF-8, not parseable) is a [`ToolingError::Config`] naming the
//! variable, never a silent fallback to the default.

use crate::{Result, ToolingError};
use std::str::FromStr;
use std::time::Duration;

/// Raw value of `key`
pub fn get_env(key: &str) -> Result<Option<String>> {
    std::env::var_os(key)
        .map(|raw| {
            raw.into_string()
                .map_err(|_| ToolingError::Config(format!("{} is not valid UTF-8", key)))
        })
        .transpose()
}

/// Value of `key` parsed as `T`, surrounding whitespace ignored
pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key)?
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ToolingError::Config(format!("{} = {:?}: {}", key, raw, e)))
        })
        .transpose()
}

/// Boolean value of `key`: `true/1/yes/on` or `false/0/no/off`, any case
pub fn get_env_bool(key: &str) -> Result<Option<bool>> {
    let Some(raw) = get_env(key)? else {
        return Ok(None);
    };

    const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSY: [&str; 4] = ["false", "0", "no", "off"];

    let normalized = raw.trim().to_ascii_lowercase();
    if TRUTHY.contains(&normalized.as_str()) {
        Ok(Some(true))
    } else if FALSY.contains(&normalized.as_str()) {
        Ok(Some(false))
    } else {
        Err(ToolingError::Config(format!(
            "{} = {:?} is not a boolean",
            key, raw
        )))
    }
}

/// `prefix` followed by `name` in upper case
///
/// ```rust
/// use tooling::config::build_env_key;
///
/// assert_eq!(build_env_key("SUBGRAPH_", "cache_ttl_secs"), "SUBGRAPH_CACHE_TTL_SECS");
/// ```
pub fn build_env_key(prefix: &str, name: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + name.len());
    key.push_str(prefix);
    key.push_str(&name.to_ascii_uppercase());
    key
}

/// Reads variables sharing one prefix
#[derive(Debug, Clone)]
pub struct EnvReader {
    prefix: String,
}

impl EnvReader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, name: &str) -> String {
        build_env_key(&self.prefix, name)
    }

    pub fn string(&self, name: &str) -> Result<Option<String>> {
        get_env(&self.key(name))
    }

    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        get_env_parse(&self.key(name))
    }

    pub fn parse_or<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse(name).map(|value| value.unwrap_or(default))
    }

    pub fn bool(&self, name: &str) -> Result<Option<bool>> {
        get_env_bool(&self.key(name))
    }

    /// Whole seconds
    pub fn duration_secs(&self, name: &str) -> Result<Option<Duration>> {
        self.parse::<u64>(name).map(|secs| secs.map(Duration::from_secs))
    }

    /// Whole milliseconds
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>> {
        self.parse::<u64>(name).map(|millis| millis.map(Duration::from_millis))
    }
}
