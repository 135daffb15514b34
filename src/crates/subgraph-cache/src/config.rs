//! Cache configuration

use crate::codec::CompressionLevel;
use std::time::Duration;
use tooling::config::{ConfigBuilder, EnvReader};
use tooling::ToolingError;

/// Default lifetime of a namespace, counted from its creation
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Namespace lifetime; entries are swept once it elapses
    pub ttl: Duration,
    pub compression: CompressionLevel,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            compression: CompressionLevel::Default,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }
}

impl ConfigBuilder for CacheConfig {
    fn validate(&self) -> tooling::Result<()> {
        if self.ttl.is_zero() {
            return Err(ToolingError::Config("cache TTL must be non-zero".into()));
        }
        Ok(())
    }

    /// Reads `{prefix}CACHE_TTL_SECS` and `{prefix}CACHE_COMPRESSION`.
    fn from_env(prefix: &str) -> tooling::Result<Self> {
        let env = EnvReader::new(prefix);
        let defaults = Self::default();
        Ok(Self {
            ttl: env.duration_secs("CACHE_TTL_SECS")?.unwrap_or(defaults.ttl),
            compression: env
                .parse("CACHE_COMPRESSION")?
                .unwrap_or(defaults.compression),
        })
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        self.ttl = other.ttl;
        self.compression = other.compression;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::build().unwrap();
        assert_eq!(config.ttl, Duration::from_secs(10_800));
        assert_eq!(config.compression, CompressionLevel::Default);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = CacheConfig::default().with_ttl(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("CACHECFG_TEST_CACHE_TTL_SECS", "60");
        std::env::set_var("CACHECFG_TEST_CACHE_COMPRESSION", "best");
        let config = CacheConfig::from_env_with_defaults("CACHECFG_TEST_").unwrap();
        assert_eq!(config.ttl, Duration::from_secs(60));
        assert_eq!(config.compression, CompressionLevel::Best);
    }
}
