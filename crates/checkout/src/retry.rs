use std::time::Duration;

use rand::Rng;

use crate::error::CheckoutError;

/// Commit attempts per operation before giving up on a contended stream.
///
/// Every lost race means a competing command committed, so a re-read is
/// always closer to a decision. The cap only bounds pathological contention.
pub const MAX_COMMIT_ATTEMPTS: u32 = 64;

const BASE_BACKOFF: Duration = Duration::from_micros(200);
const MAX_BACKOFF: Duration = Duration::from_millis(25);

/// Full-jitter delay before attempt `attempt + 1`.
pub(crate) fn backoff(attempt: u32) -> Duration {
    let ceiling = BASE_BACKOFF
        .saturating_mul(1 << attempt.min(10))
        .min(MAX_BACKOFF);
    let micros = ceiling.as_micros() as u64;
    Duration::from_micros(rand::thread_rng().gen_range(micros / 2..=micros))
}

/// Decides what to do after attempt number `attempt` failed.
///
/// Returns `Ok(())` once the jittered backoff has elapsed and the operation
/// should re-read and try again, or the error to surface. Lost races past the
/// last attempt become [`CheckoutError::Conflict`].
pub(crate) async fn after_failure(
    error: CheckoutError,
    attempt: u32,
    operation: &'static str,
) -> Result<(), CheckoutError> {
    if !error.is_conflict() {
        return Err(error);
    }
    metrics::counter!("stock_reservation_conflicts_total", "operation" => operation).increment(1);
    if attempt >= MAX_COMMIT_ATTEMPTS {
        tracing::warn!(operation, attempt, "giving up after repeated commit conflicts");
        return Err(CheckoutError::Conflict);
    }
    tracing::debug!(operation, attempt, "commit conflict, re-reading");
    tokio::time::sleep(backoff(attempt)).await;
    Ok(())
}
