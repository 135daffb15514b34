//! Per-call execution context

use crate::signal::AbortSignal;
use serde_json::Value;
use std::sync::Arc;

/// Cancellation signal plus opaque state forwarded to every invocation
///
/// The runner observes the signal but never owns it; `state` is passed
/// through untouched.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    signal: AbortSignal,
    state: Arc<Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Arc::new(state);
        self
    }

    /// Get the abort signal
    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Get the pass-through state
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Same state, with a child signal that aborts with this one
    pub(crate) fn scoped(&self) -> ExecutionContext {
        ExecutionContext {
            signal: self.signal.child(),
            state: Arc::clone(&self.state),
        }
    }
}
