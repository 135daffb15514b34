//! Per-item execution
//!
//! [`ItemExecutor::execute`] turns one work item into an outcome:
//!
//! 1. an aborted signal short-circuits to an `Aborted` failure
//! 2. the item is validated against the target's input schema
//! 3. with a cache namespace, a stored result is returned without invoking
//! 4. otherwise the invoker runs and its outputs are cached
//! 5. an invocation error aborts the signal so queued siblings fast-fail
//!
//! Every failure is returned as an [`ItemFailure`]; nothing escapes as a
//! panic or error across the task boundary.

use crate::context::ExecutionContext;
use crate::error::{InvokeError, ItemFailure, Result};
use crate::invoker::GraphInvoker;
use crate::queue::panic_message;
use crate::target::{Target, TargetRef};
use crate::value::{Outputs, WorkItem};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use subgraph_cache::CacheNamespace;
use tooling::serialization::{digest, truncate_for_log};
use tracing::{debug, warn};

/// Outcome of one item or stage
pub type ExecutionOutcome = std::result::Result<Outputs, ItemFailure>;

#[derive(Serialize)]
struct CacheKey<'a> {
    target: &'a TargetRef,
    inputs: &'a WorkItem,
}

/// Runs items against one target
#[derive(Clone)]
pub struct ItemExecutor {
    invoker: Arc<dyn GraphInvoker>,
    target: Arc<Target>,
    cache: Option<CacheNamespace>,
}

impl ItemExecutor {
    pub fn new(invoker: Arc<dyn GraphInvoker>, target: Arc<Target>) -> Self {
        Self {
            invoker,
            target,
            cache: None,
        }
    }

    /// Enable caching in the given namespace
    pub fn with_cache(mut self, namespace: CacheNamespace) -> Self {
        self.cache = Some(namespace);
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Content-addressed key of an item for this target
    pub fn cache_key(&self, item: &WorkItem) -> Result<String> {
        Ok(digest(&CacheKey {
            target: self.target.reference(),
            inputs: item,
        })?)
    }

    pub async fn execute(
        &self,
        index: usize,
        item: &WorkItem,
        ctx: &ExecutionContext,
    ) -> ExecutionOutcome {
        let name = self.target.name();

        if ctx.signal().is_aborted() {
            debug!(target_id = self.target.id(), item_index = index, "Skipping item, execution aborted");
            return Err(ItemFailure::aborted(index, name));
        }

        let report = self.target.schema().validate(item);
        if let Some(message) = report.message() {
            debug!(target_id = self.target.id(), item_index = index, %message, "Item failed validation");
            return Err(ItemFailure::validation(
                index,
                format!("Input validation error for {}: {}", name, message),
            ));
        }

        let cache_slot = match &self.cache {
            Some(namespace) => {
                let cache_key = self.cache_key(item).map_err(|e| {
                    ItemFailure::cache(
                        index,
                        format!("Cache key for {} could not be computed: {}", name, e),
                    )
                })?;

                match namespace.get::<Outputs>(&cache_key).await {
                    Ok(Some(outputs)) => return Ok(outputs),
                    Ok(None) => Some((namespace, cache_key)),
                    Err(e) => {
                        warn!(target_id = self.target.id(), item_index = index, error = %e, "Cache read failed");
                        return Err(ItemFailure::cache(
                            index,
                            format!("Cache read failed for {}: {}", name, e),
                        ));
                    }
                }
            }
            None => None,
        };

        match self.invoke(item, ctx).await {
            Ok(outputs) => {
                if let Some((namespace, cache_key)) = cache_slot {
                    if let Err(e) = namespace.put(&cache_key, &outputs).await {
                        warn!(target_id = self.target.id(), item_index = index, error = %e, "Cache write failed");
                        return Err(ItemFailure::cache(
                            index,
                            format!("Cache write failed for {}: {}", name, e),
                        ));
                    }
                }
                Ok(outputs)
            }
            Err(e) => {
                ctx.signal().abort();
                warn!(
                    target_id = self.target.id(),
                    item_index = index,
                    inputs = %truncate_for_log(&item.to_string(), 256),
                    error = %e,
                    "Invocation failed, aborting work that has not started"
                );
                Err(ItemFailure::invocation(
                    index,
                    format!("Error running {}. Inputs: {}. {}", name, item, e),
                ))
            }
        }
    }

    async fn invoke(
        &self,
        item: &WorkItem,
        ctx: &ExecutionContext,
    ) -> std::result::Result<Outputs, InvokeError> {
        let call = self.invoker.invoke(self.target.reference(), item, ctx);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(format!("invoker panicked: {}", panic_message(payload)).into()),
        }
    }
}

impl std::fmt::Debug for ItemExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemExecutor")
            .field("target", self.target.reference())
            .field("cache", &self.cache.as_ref().map(CacheNamespace::id))
            .finish()
    }
}
