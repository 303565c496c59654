use std::{future::Future, pin::Pin, time::Duration};

use tokio::time::sleep;

/// Runs `operation` until it succeeds, sleeping between attempts and doubling
/// the delay each time. Gives back the last error once `max_retries` extra
/// attempts have failed.
pub async fn retry_with_backoff<F, T, E>(
    mut operation: F,
    max_retries: usize,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Pin<Box<dyn Future<Output = Result<T, E>> + Send>>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(attempt, error = %e, ?delay, "Database operation failed, retrying");
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
