#![allow(dead_code)]

// Shared test fixtures: an instrumented invoker and target builders

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subgraph_core::{
    ExecutionContext, GraphInvoker, InvokeError, NodeDefinition, Outputs, Target,
    TargetDefinition, TargetRef, WorkItem,
};

/// Route `tracing` output through the test harness; honors `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records calls and the concurrent-call high-water mark
///
/// Reads `a` (the item number) and `delay` (milliseconds to sleep) from its
/// input and returns `{"out": a * 10}`.
#[derive(Default)]
pub struct Recorder {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub high_water: AtomicUsize,
    pub seen: Mutex<Vec<i64>>,
    pub fail_on: Option<i64>,
    pub hold_until_abort: bool,
}

impl Recorder {
    pub fn failing_on(a: i64) -> Self {
        Self {
            fail_on: Some(a),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphInvoker for Recorder {
    async fn invoke(
        &self,
        _target: &TargetRef,
        input: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<Outputs, InvokeError> {
        let input = input.to_json();
        let a = input["a"]
            .as_i64()
            .or_else(|| input["a"]["value"].as_i64())
            .unwrap_or_default();
        let delay = input["delay"].as_u64().unwrap_or_default();

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(a);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(delay)).await;
        let failing = self.fail_on == Some(a);
        if self.hold_until_abort && !failing {
            ctx.signal().aborted().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if failing {
            return Err("boom".into());
        }

        let mut outputs = Outputs::new();
        outputs.insert("out".into(), json!(a * 10));
        Ok(outputs)
    }
}

/// Target named `Double` that declares a numeric input `a`
pub fn target_with(extra_nodes: Vec<NodeDefinition>) -> Target {
    let mut nodes = vec![NodeDefinition::graph_input("in-a", "a", "number")];
    nodes.extend(extra_nodes);
    Target::new(TargetRef::new("g-double", "Double"), TargetDefinition::new(nodes))
}

pub fn target() -> Target {
    target_with(Vec::new())
}

pub fn out(value: i64) -> Outputs {
    let mut outputs = Outputs::new();
    outputs.insert("out".into(), json!(value));
    outputs
}
