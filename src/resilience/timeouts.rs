//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a deadline
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timeout is a transport failure like any other: the next backend is tried

use std::future::Future;
use std::time::Duration;

use crate::http::proxy::ForwardError;

/// Run `fut` with a deadline, mapping expiry to [`ForwardError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, ForwardError>
where
    F: Future<Output = Result<T, ForwardError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ForwardError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_expires() {
        let result: Result<(), _> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ForwardError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let result = with_deadline(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
