//! Iterator-mode runner
//!
//! [`BatchRunner::run_batch`] invokes one target once per item, at most
//! `concurrency` invocations at a time, and returns outputs in item order.
//! The first invocation error aborts items that have not started yet;
//! items already running finish normally.

use crate::chunk::ChunkCursor;
use crate::context::ExecutionContext;
use crate::error::{ItemFailure, Result};
use crate::executor::ItemExecutor;
use crate::invoker::GraphInvoker;
use crate::queue::{Concurrency, TaskQueue};
use crate::target::{FingerprintScope, Target};
use crate::value::{Outputs, WorkItem};
use serde_json::Value;
use std::sync::Arc;
use subgraph_cache::CacheRegistry;
use thiserror::Error;
use tooling::logging::timed;
use tracing::{info, warn};
use uuid::Uuid;

/// Separator between item failures in the aggregate message
pub const FAILURE_DELIMITER: &str = ";\n  ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub concurrency: Concurrency,
    pub caching: bool,
}

impl BatchOptions {
    pub fn new(concurrency: impl Into<Concurrency>) -> Self {
        Self {
            concurrency: concurrency.into(),
            caching: false,
        }
    }

    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }
}

/// Every failed item of a batch, in item order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BatchFailure {
    pub message: String,
    pub failures: Vec<ItemFailure>,
}

impl BatchFailure {
    pub fn from_failures(failures: Vec<ItemFailure>) -> Self {
        let message = failures
            .iter()
            .map(ItemFailure::to_string)
            .collect::<Vec<_>>()
            .join(FAILURE_DELIMITER);
        Self { message, failures }
    }

    /// Indices of items that never ran because of an abort
    pub fn aborted_indices(&self) -> Vec<usize> {
        self.failures
            .iter()
            .filter(|f| f.is_aborted())
            .map(|f| f.index)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Outputs of every item, in item order
    Success(Vec<Outputs>),
    Failure(BatchFailure),
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success(_))
    }

    pub fn outputs(&self) -> Option<&[Outputs]> {
        match self {
            BatchOutcome::Success(outputs) => Some(outputs),
            BatchOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&BatchFailure> {
        match self {
            BatchOutcome::Success(_) => None,
            BatchOutcome::Failure(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> std::result::Result<Vec<Outputs>, BatchFailure> {
        match self {
            BatchOutcome::Success(outputs) => Ok(outputs),
            BatchOutcome::Failure(failure) => Err(failure),
        }
    }
}

/// Runs a target over a sequence of independent items
#[derive(Clone)]
pub struct BatchRunner {
    invoker: Arc<dyn GraphInvoker>,
    registry: CacheRegistry,
}

impl BatchRunner {
    pub fn new(invoker: Arc<dyn GraphInvoker>, registry: CacheRegistry) -> Self {
        Self { invoker, registry }
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Run raw JSON items
    ///
    /// Every item must be an object (or object envelope). A malformed item
    /// fails the whole batch before anything is invoked.
    pub async fn run_batch(
        &self,
        items: Vec<Value>,
        target: impl Into<Arc<Target>>,
        options: BatchOptions,
        ctx: &ExecutionContext,
    ) -> Result<BatchOutcome> {
        let work_items = match parse_items(items) {
            Ok(work_items) => work_items,
            Err(failure) => return Ok(BatchOutcome::Failure(BatchFailure::from_failures(vec![failure]))),
        };
        self.run_items(work_items, target, options, ctx).await
    }

    /// Run already-classified items
    pub async fn run_items(
        &self,
        items: Vec<WorkItem>,
        target: impl Into<Arc<Target>>,
        options: BatchOptions,
        ctx: &ExecutionContext,
    ) -> Result<BatchOutcome> {
        let target = target.into();
        let executor = self.executor(&target, options.caching).await?;
        let batch_ctx = ctx.scoped();

        let outcomes = timed(
            "run_batch",
            self.execute_all(&executor, 0, items, options.concurrency, &batch_ctx),
        )
        .await;

        if options.caching {
            spawn_sweep(&self.registry);
        }
        Ok(aggregate(outcomes))
    }

    /// Run items chunk by chunk, each chunk as its own bounded batch
    ///
    /// Stops after the first chunk with a failure; item indices in failures
    /// refer to the whole input.
    pub async fn run_chunked(
        &self,
        items: Vec<Value>,
        target: impl Into<Arc<Target>>,
        chunk_size: i64,
        options: BatchOptions,
        ctx: &ExecutionContext,
    ) -> Result<BatchOutcome> {
        let work_items = match parse_items(items) {
            Ok(work_items) => work_items,
            Err(failure) => return Ok(BatchOutcome::Failure(BatchFailure::from_failures(vec![failure]))),
        };

        let target = target.into();
        let executor = self.executor(&target, options.caching).await?;
        let batch_ctx = ctx.scoped();
        let mut cursor: ChunkCursor<WorkItem, Outputs> = ChunkCursor::new(work_items, chunk_size);

        let mut outcome = None;
        while let Some(chunk) = cursor.next_chunk() {
            let outcomes = self
                .execute_all(
                    &executor,
                    chunk.start_index,
                    chunk.items,
                    options.concurrency,
                    &batch_ctx,
                )
                .await;

            match aggregate(outcomes) {
                BatchOutcome::Success(outputs) => cursor.accumulate(outputs),
                failure => {
                    outcome = Some(failure);
                    break;
                }
            }
        }

        if options.caching {
            spawn_sweep(&self.registry);
        }

        Ok(match outcome {
            Some(failure) => failure,
            None => BatchOutcome::Success(cursor.finish().unwrap_or_default()),
        })
    }

    async fn executor(&self, target: &Arc<Target>, caching: bool) -> Result<ItemExecutor> {
        let executor = ItemExecutor::new(Arc::clone(&self.invoker), Arc::clone(target));
        if !caching {
            return Ok(executor);
        }

        let fingerprint = target.fingerprint(FingerprintScope::Nodes)?;
        let namespace = self.registry.get_or_create(target.id(), &fingerprint).await?;
        Ok(executor.with_cache(namespace))
    }

    async fn execute_all(
        &self,
        executor: &ItemExecutor,
        base_index: usize,
        items: Vec<WorkItem>,
        concurrency: Concurrency,
        ctx: &ExecutionContext,
    ) -> Vec<std::result::Result<Outputs, ItemFailure>> {
        let batch_id = Uuid::new_v4();
        let item_count = items.len();
        info!(
            %batch_id,
            target_id = executor.target().id(),
            items = item_count,
            concurrency = concurrency.get(),
            caching = executor.is_caching(),
            "Starting batch"
        );

        let queue = TaskQueue::new(concurrency);
        let executor = Arc::new(executor.clone());
        let tasks = items.into_iter().enumerate().map(|(offset, item)| {
            let executor = Arc::clone(&executor);
            let ctx = ctx.clone();
            async move { executor.execute(base_index + offset, &item, &ctx).await }
        });

        let results = queue.run_all(tasks).await;
        queue.on_idle().await;

        let name = executor.target().name().to_string();
        let outcomes: Vec<_> = results
            .into_iter()
            .enumerate()
            .map(|(offset, result)| {
                result.unwrap_or_else(|e| {
                    Err(ItemFailure::invocation(
                        base_index + offset,
                        format!("Error running {}: {}", name, e),
                    ))
                })
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        if failed > 0 {
            warn!(%batch_id, items = item_count, failed, "Batch finished with failures");
        } else {
            info!(%batch_id, items = item_count, "Batch completed");
        }
        outcomes
    }
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("registry", &self.registry)
            .finish()
    }
}

fn parse_items(items: Vec<Value>) -> std::result::Result<Vec<WorkItem>, ItemFailure> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            WorkItem::from_json(value).ok_or_else(|| {
                ItemFailure::validation(
                    index,
                    "Input must be an array of objects or object data values",
                )
            })
        })
        .collect()
}

fn aggregate(outcomes: Vec<std::result::Result<Outputs, ItemFailure>>) -> BatchOutcome {
    let mut outputs = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(item_outputs) => outputs.push(item_outputs),
            Err(failure) => failures.push(failure),
        }
    }

    if failures.is_empty() {
        BatchOutcome::Success(outputs)
    } else {
        BatchOutcome::Failure(BatchFailure::from_failures(failures))
    }
}

/// Drop expired cache namespaces in the background; failures are only logged
pub(crate) fn spawn_sweep(registry: &CacheRegistry) {
    let registry = registry.clone();
    tokio::spawn(async move {
        if let Err(e) = registry.sweep_expired().await {
            warn!(error = %e, "Expired cache sweep failed");
        }
    });
}
