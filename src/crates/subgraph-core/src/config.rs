//! Runner configuration
//!
//! Loaded from `SUBGRAPH_*` environment variables on top of the defaults:
//!
//! | Variable | Default |
//! |---|---|
//! | `SUBGRAPH_CONCURRENCY` | 1 |
//! | `SUBGRAPH_CACHE_ENABLED` | false |
//! | `SUBGRAPH_CACHE_TTL_SECS` | 10800 |
//! | `SUBGRAPH_CACHE_COMPRESSION` | default |
//! | `SUBGRAPH_INVOCATION_TIMEOUT_MS` | unset |
//! | `SUBGRAPH_PIPELINE_LOOPS` | 1 |

use crate::batch::BatchOptions;
use crate::invoker::{GraphInvoker, TimeoutInvoker};
use crate::pipeline::{PipelineOptions, PipelineSpec, MAX_LOOPS};
use crate::queue::Concurrency;
use crate::target::Target;
use std::sync::Arc;
use std::time::Duration;
use subgraph_cache::store::ContentStore;
use subgraph_cache::{CacheConfig, CacheRegistry};
use tooling::config::{ConfigBuilder, EnvReader};
use tooling::ToolingError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SUBGRAPH_";

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Requested concurrency; values below 1 run one item at a time
    pub concurrency: i64,
    pub caching: bool,
    pub cache: CacheConfig,
    /// Per-invocation timeout, applied by wrapping the invoker
    pub invocation_timeout: Option<Duration>,
    pub pipeline_loops: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            caching: false,
            cache: CacheConfig::default(),
            invocation_timeout: None,
            pipeline_loops: 1,
        }
    }
}

impl RunnerConfig {
    /// Load `SUBGRAPH_*` variables over the defaults
    pub fn load() -> tooling::Result<Self> {
        Self::from_env_with_defaults(ENV_PREFIX)
    }

    pub fn with_concurrency(mut self, concurrency: i64) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    pub fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::new(Concurrency::new(self.concurrency)).with_caching(self.caching)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::default().with_caching(self.caching)
    }

    /// Pipeline loop count clamped to `1..=MAX_LOOPS`
    pub fn effective_loops(&self) -> usize {
        self.pipeline_loops.clamp(1, MAX_LOOPS)
    }

    /// Pipeline over `stages` repeated `pipeline_loops` times
    pub fn pipeline_spec(&self, stages: Vec<Arc<Target>>) -> PipelineSpec {
        PipelineSpec::new(stages).with_loops(self.pipeline_loops)
    }

    /// Apply the invocation timeout, if any
    pub fn wrap_invoker(&self, invoker: Arc<dyn GraphInvoker>) -> Arc<dyn GraphInvoker> {
        match self.invocation_timeout {
            Some(timeout) => Arc::new(TimeoutInvoker::new(invoker, timeout)),
            None => invoker,
        }
    }

    /// Registry over `store` using the cache settings
    pub fn registry(&self, store: Arc<dyn ContentStore>) -> CacheRegistry {
        CacheRegistry::new(store, self.cache.clone())
    }
}

impl ConfigBuilder for RunnerConfig {
    fn validate(&self) -> tooling::Result<()> {
        if matches!(self.invocation_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(ToolingError::Config(
                "invocation timeout must be non-zero".into(),
            ));
        }
        self.cache.validate()
    }

    fn from_env(prefix: &str) -> tooling::Result<Self> {
        let env = EnvReader::new(prefix);
        let defaults = Self::default();
        Ok(Self {
            concurrency: env.parse_or("CONCURRENCY", defaults.concurrency)?,
            caching: env.bool("CACHE_ENABLED")?.unwrap_or(defaults.caching),
            cache: CacheConfig::from_env(prefix)?,
            invocation_timeout: env.duration_millis("INVOCATION_TIMEOUT_MS")?,
            pipeline_loops: env.parse_or("PIPELINE_LOOPS", defaults.pipeline_loops)?,
        })
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        self.concurrency = other.concurrency;
        self.caching = other.caching;
        self.cache.merge(other.cache);
        if other.invocation_timeout.is_some() {
            self.invocation_timeout = other.invocation_timeout;
        }
        self.pipeline_loops = other.pipeline_loops;
        self
    }
}
