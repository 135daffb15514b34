//! Pipeline-mode runner
//!
//! Stages run strictly one after another: the outputs of a stage become the
//! inputs of the next one, with the pipeline input re-injected under
//! [`PIPELINE_INPUT_KEY`]. Looped stages additionally see their position
//! under [`PIPELINE_INDEX_KEY`]. The first failing stage stops the run.

use crate::batch::spawn_sweep;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, FailureKind, Result};
use crate::executor::ItemExecutor;
use crate::invoker::GraphInvoker;
use crate::target::{FingerprintScope, Target};
use crate::value::{DataValue, Outputs, WorkItem};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use subgraph_cache::CacheRegistry;
use thiserror::Error;
use tooling::logging::timed;
use tracing::{debug, info, warn};

/// Upper bound for the loop count
pub const MAX_LOOPS: usize = 100;
/// Key carrying the pipeline input into every stage
pub const PIPELINE_INPUT_KEY: &str = "pipelineInput";
/// Key carrying the position of a looped stage
pub const PIPELINE_INDEX_KEY: &str = "pipelineIndex";
/// Stage name reported when the pipeline input itself is malformed
pub const INPUT_STAGE: &str = "pipeline-input";

/// Stages of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub pre: Option<Arc<Target>>,
    pub stages: Vec<Arc<Target>>,
    pub post: Option<Arc<Target>>,
    pub loop_count: usize,
}

impl PipelineSpec {
    pub fn new(stages: Vec<Arc<Target>>) -> Self {
        Self {
            pre: None,
            stages,
            post: None,
            loop_count: 1,
        }
    }

    pub fn with_pre(mut self, target: impl Into<Arc<Target>>) -> Self {
        self.pre = Some(target.into());
        self
    }

    pub fn with_post(mut self, target: impl Into<Arc<Target>>) -> Self {
        self.post = Some(target.into());
        self
    }

    pub fn with_loops(mut self, loop_count: usize) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Loop count clamped to `1..=MAX_LOOPS`
    pub fn effective_loops(&self) -> usize {
        self.loop_count.clamp(1, MAX_LOOPS)
    }

    /// Stage identifiers in execution order
    pub fn stage_identifiers(&self) -> Vec<String> {
        self.plan().into_iter().map(|stage| stage.identifier).collect()
    }

    fn plan(&self) -> Vec<PlannedStage> {
        let mut plan = Vec::new();

        if let Some(pre) = &self.pre {
            plan.push(PlannedStage {
                identifier: "stage-pre".to_string(),
                target: Arc::clone(pre),
                pipeline_index: None,
            });
        }

        for loop_index in 0..self.effective_loops() {
            for (stage_index, target) in self.stages.iter().enumerate() {
                plan.push(PlannedStage {
                    identifier: format!("loop-{} stage-{}", loop_index, stage_index),
                    target: Arc::clone(target),
                    pipeline_index: Some(stage_index),
                });
            }
        }

        if let Some(post) = &self.post {
            plan.push(PlannedStage {
                identifier: "stage-post".to_string(),
                target: Arc::clone(post),
                pipeline_index: None,
            });
        }

        plan
    }
}

struct PlannedStage {
    identifier: String,
    target: Arc<Target>,
    pipeline_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub caching: bool,
}

impl PipelineOptions {
    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }
}

/// A completed stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub identifier: String,
    pub target_name: String,
    pub input: Value,
    pub output: Outputs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Outputs of the last stage, without the pipeline input
    pub outputs: Outputs,
    pub stages: Vec<StageRecord>,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Pipeline failed at {stage}: {message}")]
pub struct PipelineFailure {
    pub stage: String,
    pub kind: FailureKind,
    pub message: String,
    /// Stages that completed before the failure
    pub completed: Vec<StageRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Success(PipelineResult),
    Failure(PipelineFailure),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    pub fn into_result(self) -> std::result::Result<PipelineResult, PipelineFailure> {
        match self {
            PipelineOutcome::Success(result) => Ok(result),
            PipelineOutcome::Failure(failure) => Err(failure),
        }
    }
}

/// Runs a sequence of targets, each fed by the previous one
#[derive(Clone)]
pub struct PipelineRunner {
    invoker: Arc<dyn GraphInvoker>,
    registry: CacheRegistry,
}

impl PipelineRunner {
    pub fn new(invoker: Arc<dyn GraphInvoker>, registry: CacheRegistry) -> Self {
        Self { invoker, registry }
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub async fn run_pipeline(
        &self,
        input: Value,
        spec: &PipelineSpec,
        options: PipelineOptions,
        ctx: &ExecutionContext,
    ) -> Result<PipelineOutcome> {
        let plan = spec.plan();
        if plan.is_empty() {
            return Err(ExecutionError::Configuration(
                "pipeline has no stages".to_string(),
            ));
        }

        let Some(input) = WorkItem::from_json(input) else {
            return Ok(PipelineOutcome::Failure(PipelineFailure {
                stage: INPUT_STAGE.to_string(),
                kind: FailureKind::Validation,
                message: "Pipeline input must be an object or an object data value".to_string(),
                completed: Vec::new(),
            }));
        };

        let outcome = timed("run_pipeline", self.run_stages(plan, input, options, ctx)).await;

        if options.caching {
            spawn_sweep(&self.registry);
        }
        outcome
    }

    async fn run_stages(
        &self,
        plan: Vec<PlannedStage>,
        input: WorkItem,
        options: PipelineOptions,
        ctx: &ExecutionContext,
    ) -> Result<PipelineOutcome> {
        let pipeline_ctx = ctx.scoped();
        let pipeline_input = DataValue::Object(input.to_map());
        let mut current = WorkItem::new().with(PIPELINE_INPUT_KEY, pipeline_input.clone());
        let mut records: Vec<StageRecord> = Vec::with_capacity(plan.len());

        for (position, stage) in plan.into_iter().enumerate() {
            if !stage.target.reference().is_valid() {
                warn!(stage = %stage.identifier, "Stage has an invalid graph reference");
                return Ok(PipelineOutcome::Failure(PipelineFailure {
                    message: format!("Graph reference is invalid for graph {}", stage.identifier),
                    stage: stage.identifier,
                    kind: FailureKind::Validation,
                    completed: records,
                }));
            }

            let mut stage_input = current;
            if let Some(index) = stage.pipeline_index {
                stage_input.insert(PIPELINE_INDEX_KEY, Value::from(index));
            }

            let executor = self.executor(&stage.target, options.caching).await?;
            debug!(
                stage = %stage.identifier,
                target_id = stage.target.id(),
                "Running pipeline stage"
            );

            match executor.execute(position, &stage_input, &pipeline_ctx).await {
                Ok(outputs) => {
                    let mut next = WorkItem::from_map(outputs.clone());
                    next.insert(PIPELINE_INPUT_KEY, pipeline_input.clone());
                    records.push(StageRecord {
                        identifier: stage.identifier,
                        target_name: stage.target.name().to_string(),
                        input: stage_input.to_json(),
                        output: outputs,
                    });
                    current = next;
                }
                Err(failure) => {
                    warn!(
                        stage = %stage.identifier,
                        target_id = stage.target.id(),
                        kind = %failure.kind,
                        "Pipeline stage failed"
                    );
                    return Ok(PipelineOutcome::Failure(PipelineFailure {
                        stage: stage.identifier,
                        kind: failure.kind,
                        message: failure.message,
                        completed: records,
                    }));
                }
            }
        }

        info!(stages = records.len(), "Pipeline completed");

        let mut outputs = current.to_map();
        outputs.remove(PIPELINE_INPUT_KEY);
        Ok(PipelineOutcome::Success(PipelineResult {
            outputs,
            stages: records,
        }))
    }

    async fn executor(&self, target: &Arc<Target>, caching: bool) -> Result<ItemExecutor> {
        let executor = ItemExecutor::new(Arc::clone(&self.invoker), Arc::clone(target));
        if !caching {
            return Ok(executor);
        }

        let fingerprint = target.fingerprint(FingerprintScope::NodesAndConnections)?;
        let namespace = self.registry.get_or_create(target.id(), &fingerprint).await?;
        Ok(executor.with_cache(namespace))
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("registry", &self.registry)
            .finish()
    }
}
