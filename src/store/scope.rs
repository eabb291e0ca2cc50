//! Per-request bounds on store calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// Deadline and cancellation signal bounding the store calls of one request.
#[derive(Debug, Clone)]
pub struct RequestScope {
    deadline: Instant,
    cancel: CancellationToken,
}

impl RequestScope {
    /// Start a scope whose deadline is `timeout` from now.
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive a store call to completion unless the scope is cancelled or its
    /// deadline passes first. The call is dropped in either case.
    pub async fn run<F, T>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(StoreError::DeadlineExceeded),
            result = call => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let scope = RequestScope::new(Duration::from_secs(5), CancellationToken::new());
        let value = scope.run(async { Ok::<_, StoreError>(42) }).await.unwrap();
        assert_eq!(value, 42);

        let err = scope
            .run(async { Err::<(), _>(StoreError::Unavailable("down".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let scope = RequestScope::new(Duration::from_millis(20), CancellationToken::new());
        let err = scope
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_deadline_covers_all_calls() {
        let scope = RequestScope::new(Duration::from_millis(60), CancellationToken::new());
        let step = || async {
            tokio::time::sleep(Duration::from_millis(25)).await;
            Ok::<_, StoreError>(())
        };

        scope.run(step()).await.unwrap();
        scope.run(step()).await.unwrap();
        let err = scope.run(step()).await.unwrap_err();
        assert!(matches!(err, StoreError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let cancel = CancellationToken::new();
        let scope = RequestScope::new(Duration::from_secs(5), cancel.clone());
        cancel.cancel();

        let err = scope.run(async { Ok::<_, StoreError>(1) }).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_cancelled_while_waiting() {
        let cancel = CancellationToken::new();
        let scope = RequestScope::new(Duration::from_secs(5), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = scope
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }
}
