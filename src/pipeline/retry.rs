//! Deadline and bounded retry around a single backend call.

use std::future::Future;
use std::time::Duration;

use pinforge_common::{Error, Result};
use tracing::warn;

use crate::config::UploadConfig;

/// How a backend call is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for CallPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            initial_backoff: config.retry_backoff(),
        }
    }
}

/// Run `call` under the policy.
///
/// Each attempt gets the full deadline. A timeout ends the call immediately;
/// retryable backend errors are repeated with doubling backoff until
/// `max_retries` extra attempts are used up.
pub async fn call_with_policy<T, F, Fut>(
    policy: &CallPolicy,
    operation: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0u32;
    let mut backoff = policy.initial_backoff;

    loop {
        match tokio::time::timeout(policy.timeout, call()).await {
            Err(_) => return Err(Error::timeout(operation, policy.timeout)),
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if e.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                warn!(
                    retry = retries,
                    wait_ms = backoff.as_millis() as u64,
                    "{} failed, backing off: {}",
                    operation,
                    e
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Ok(Err(e)) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_retryable_errors_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result = call_with_policy(&fast_policy(2), "upload", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::backend(Some(503), "unavailable"))
            } else {
                Ok("cid")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "cid");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result: Result<()> = call_with_policy(&fast_policy(1), "upload", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::backend(None, "connection reset"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let result: Result<()> = call_with_policy(&fast_policy(3), "upload", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::backend(Some(401), "unauthorized"))
        })
        .await;

        assert!(matches!(result, Err(Error::Backend { status: Some(401), .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_fatal() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let policy = CallPolicy {
            timeout: Duration::from_millis(20),
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
        };
        let result: Result<()> = call_with_policy(&policy, "upload medias", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Timeout { after, .. } if after == Duration::from_millis(20)));
        assert_eq!(err.to_string(), "upload medias timed out after 20ms");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
