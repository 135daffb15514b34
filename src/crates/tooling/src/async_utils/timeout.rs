//! Deadline wrapper for fallible futures

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeoutError<E> {
    /// The future finished in time with an error
    #[error("{0}")]
    Failed(E),

    #[error("timed out after {0:?}")]
    Elapsed(Duration),
}

impl<E> TimeoutError<E> {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, TimeoutError::Elapsed(_))
    }

    /// The future's own error, if it finished in time
    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeoutError::Failed(e) => Some(e),
            TimeoutError::Elapsed(_) => None,
        }
    }
}

/// Run `future`, giving up after `limit`
///
/// The future is dropped when the limit elapses.
pub async fn with_timeout<F, T, E>(limit: Duration, future: F) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(limit))?
        .map_err(TimeoutError::Failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finishes_in_time() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, String>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_inner_error_is_kept() {
        let err = with_timeout(Duration::from_secs(1), async { Err::<u32, _>("boom".to_string()) })
            .await
            .unwrap_err();
        assert!(!err.is_elapsed());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.into_inner().as_deref(), Some("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed() {
        let err = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<(), String>(())
        })
        .await
        .unwrap_err();
        assert!(err.is_elapsed());
        assert_eq!(err.to_string(), "timed out after 50ms");
    }
}
