//! Layered configuration
//!
//! A configuration starts from its `Default`, takes environment overrides
//! through `from_env` + `merge`, and is checked by `validate` before use.

use crate::Result;

pub trait ConfigBuilder: Default + Clone {
    /// Reject out-of-range or conflicting values
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Read `{prefix}{FIELD}` variables; unset fields keep their default
    fn from_env(prefix: &str) -> Result<Self>;

    /// Overwrite `self` with `other`
    fn merge(&mut self, other: Self) -> &mut Self;

    /// Validated default configuration
    fn build() -> Result<Self> {
        Self::default().validated()
    }

    /// Defaults, then environment, then validation
    fn from_env_with_defaults(prefix: &str) -> Result<Self> {
        let mut layered = Self::default();
        layered.merge(Self::from_env(prefix)?);
        layered.validated()
    }

    /// Return `self` if it validates
    fn validated(self) -> Result<Self> {
        self.validate().map(|()| self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolingError;

    #[derive(Debug, Clone, PartialEq)]
    struct SweepConfig {
        interval_secs: i64,
        namespaces: Vec<String>,
    }

    impl Default for SweepConfig {
        fn default() -> Self {
            Self {
                interval_secs: 60,
                namespaces: vec!["default".to_string()],
            }
        }
    }

    impl ConfigBuilder for SweepConfig {
        fn validate(&self) -> Result<()> {
            if self.interval_secs <= 0 {
                return Err(ToolingError::Config("interval must be positive".into()));
            }
            Ok(())
        }

        fn from_env(_prefix: &str) -> Result<Self> {
            Ok(Self {
                interval_secs: 5,
                namespaces: vec!["env".to_string()],
            })
        }

        fn merge(&mut self, other: Self) -> &mut Self {
            self.interval_secs = other.interval_secs;
            self.namespaces.extend(other.namespaces);
            self
        }
    }

    #[test]
    fn test_validation_rejects() {
        let config = SweepConfig {
            interval_secs: 0,
            namespaces: Vec::new(),
        };
        assert!(config.clone().validated().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_is_default() {
        assert_eq!(SweepConfig::build().unwrap(), SweepConfig::default());
    }

    #[test]
    fn test_env_layers_over_defaults() {
        let config = SweepConfig::from_env_with_defaults("SWEEP_").unwrap();
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.namespaces, vec!["default", "env"]);
    }
}
