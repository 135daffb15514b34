//! The invoker seam
//!
//! A [`GraphInvoker`] runs one sub-graph with named inputs and returns named
//! outputs. The runners only schedule, cache and aggregate around it.

use crate::context::ExecutionContext;
use crate::error::InvokeError;
use crate::target::TargetRef;
use crate::value::{Outputs, WorkItem};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tooling::async_utils::timeout::{with_timeout, TimeoutError};

/// Runs a single sub-graph invocation
///
/// Implementations may watch `ctx.signal()` to stop early; the runners do
/// not require it.
#[async_trait]
pub trait GraphInvoker: Send + Sync {
    async fn invoke(
        &self,
        target: &TargetRef,
        input: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<Outputs, InvokeError>;
}

#[async_trait]
impl<T: GraphInvoker + ?Sized> GraphInvoker for Arc<T> {
    async fn invoke(
        &self,
        target: &TargetRef,
        input: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<Outputs, InvokeError> {
        (**self).invoke(target, input, ctx).await
    }
}

/// Adapts an async closure into a [`GraphInvoker`]
///
/// ```rust,ignore
/// let invoker = FnInvoker::new(|target, input, _ctx| async move {
///     let mut outputs = Outputs::new();
///     outputs.insert("echo".into(), input.to_json());
///     Ok(outputs)
/// });
/// ```
pub struct FnInvoker<F> {
    func: F,
}

impl<F> FnInvoker<F> {
    pub fn new<Fut>(func: F) -> Self
    where
        F: Fn(TargetRef, WorkItem, ExecutionContext) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Outputs, InvokeError>> + Send,
    {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> GraphInvoker for FnInvoker<F>
where
    F: Fn(TargetRef, WorkItem, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Outputs, InvokeError>> + Send,
{
    async fn invoke(
        &self,
        target: &TargetRef,
        input: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<Outputs, InvokeError> {
        (self.func)(target.clone(), input.clone(), ctx.clone()).await
    }
}

/// Invocation exceeded its time limit
#[derive(Debug, Error)]
#[error("Invocation of {target} timed out after {timeout:?}")]
pub struct InvocationTimeout {
    pub target: String,
    pub timeout: Duration,
}

/// Bounds every call of the wrapped invoker
///
/// An elapsed timeout is reported as an ordinary invocation error.
pub struct TimeoutInvoker<I> {
    inner: I,
    timeout: Duration,
}

impl<I> TimeoutInvoker<I> {
    pub fn new(inner: I, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<I: GraphInvoker> GraphInvoker for TimeoutInvoker<I> {
    async fn invoke(
        &self,
        target: &TargetRef,
        input: &WorkItem,
        ctx: &ExecutionContext,
    ) -> Result<Outputs, InvokeError> {
        match with_timeout(self.timeout, self.inner.invoke(target, input, ctx)).await {
            Ok(outputs) => Ok(outputs),
            Err(TimeoutError::Failed(e)) => Err(e),
            Err(TimeoutError::Elapsed(timeout)) => Err(Box::new(InvocationTimeout {
                target: target.name.clone(),
                timeout,
            })),
        }
    }
}
