//! # subgraph-core - Bounded-concurrency sub-graph execution
//!
//! Invokes a sub-graph once per unit of work under a concurrency limit, with
//! per-invocation caching, abort propagation and aggregated failures.
//!
//! - [`BatchRunner`] - iterator mode: one invocation per item, outputs in
//!   item order, the first error aborts items that have not started
//! - [`PipelineRunner`] - pipeline mode: stages in sequence, each fed by the
//!   previous one, stopping at the first failing stage
//! - [`TaskQueue`] - the bounded queue both runners schedule through
//! - [`ItemExecutor`] - abort check, validation, cache lookup, invocation
//!   and cache store for a single item
//!
//! The sub-graph itself is behind the [`GraphInvoker`] trait.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use subgraph_cache::CacheRegistry;
//! use subgraph_core::{
//!     BatchOptions, BatchRunner, ExecutionContext, FnInvoker, Outputs, Target,
//!     TargetDefinition, TargetRef,
//! };
//!
//! # async fn run() -> subgraph_core::Result<()> {
//! let invoker = Arc::new(FnInvoker::new(|_target, input, _ctx| async move {
//!     let mut outputs = Outputs::new();
//!     outputs.insert("echo".into(), input.to_json());
//!     Ok(outputs)
//! }));
//! let runner = BatchRunner::new(invoker, CacheRegistry::in_memory());
//! let target = Target::new(TargetRef::new("g1", "Echo"), TargetDefinition::default());
//!
//! let outcome = runner
//!     .run_batch(
//!         vec![json!({"x": 1}), json!({"x": 2})],
//!         target,
//!         BatchOptions::new(2usize).with_caching(true),
//!         &ExecutionContext::new(),
//!     )
//!     .await?;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod chunk;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod invoker;
pub mod pipeline;
pub mod queue;
pub mod schema;
pub mod signal;
pub mod target;
pub mod value;

pub use batch::{BatchFailure, BatchOptions, BatchOutcome, BatchRunner};
pub use chunk::{Chunk, ChunkCursor};
pub use config::{RunnerConfig, ENV_PREFIX};
pub use context::ExecutionContext;
pub use error::{ExecutionError, FailureKind, InvokeError, ItemFailure, Result};
pub use executor::{ExecutionOutcome, ItemExecutor};
pub use invoker::{FnInvoker, GraphInvoker, InvocationTimeout, TimeoutInvoker};
pub use pipeline::{
    PipelineFailure, PipelineOptions, PipelineOutcome, PipelineResult, PipelineRunner,
    PipelineSpec, StageRecord,
};
pub use queue::{Concurrency, TaskError, TaskHandle, TaskQueue};
pub use schema::{InputSchema, InputSlot, ValidationReport};
pub use signal::AbortSignal;
pub use target::{
    Connection, FingerprintScope, NodeDefinition, Target, TargetDefinition, TargetRef,
};
pub use value::{DataValue, Outputs, ValueKind, WorkItem};
