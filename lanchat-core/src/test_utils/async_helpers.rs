//! Async test helpers

use std::future::Future;
use tokio::time::{timeout, Duration};

/// Panic unless `future` finishes within `duration`
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}
