//! Shared bounded request pool
//!
//! Embedding and index calls share one pool of outstanding-request slots.
//! A caller that cannot get a slot within the configured wait fails with
//! `ResourceExhausted` instead of queueing unboundedly.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::RetrievalError;

/// Bounded-outstanding-request pool
#[derive(Clone)]
pub struct RequestPool {
    semaphore: Arc<Semaphore>,
    wait: Duration,
}

impl RequestPool {
    pub fn new(max_outstanding: usize, wait: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_outstanding)),
            wait,
        }
    }

    /// Acquire a slot, waiting at most the configured T_pool
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, RetrievalError> {
        match tokio::time::timeout(self.wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            // Closed semaphore only happens at shutdown
            Ok(Err(_)) => Err(RetrievalError::PoolSaturated(self.wait.as_millis() as u64)),
            Err(_) => {
                tracing::warn!(
                    wait_ms = self.wait.as_millis() as u64,
                    "Retrieval pool saturated"
                );
                Err(RetrievalError::PoolSaturated(self.wait.as_millis() as u64))
            }
        }
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let pool = RequestPool::new(2, Duration::from_millis(50));
        let a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);
        drop(a);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_saturated_pool_times_out() {
        let pool = RequestPool::new(1, Duration::from_millis(20));
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, RetrievalError::PoolSaturated(_)));
    }
}
