//! Bounded retry combinator
//!
//! Replaces ad hoc attempt counters: the caller supplies the attempt limit and
//! a predicate separating retryable failures from terminal ones.

use std::future::Future;

use tracing::{debug, warn};

use super::error::{Stage, StageError};

/// Run `attempt` up to `limit` times
///
/// Returns the first success. A failure that `retryable` rejects is returned
/// immediately. When every attempt fails, the result is
/// `StageError::RetriesExhausted` carrying the last error's message.
pub async fn bounded<T, F, Fut, P>(stage: Stage, limit: u32, retryable: P, mut attempt: F) -> Result<T, StageError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StageError>>,
    P: Fn(&StageError) -> bool,
{
    debug!(%stage, limit, "bounded: called");
    let mut last = String::from("no attempts made");
    for n in 1..=limit {
        match attempt(n).await {
            Ok(value) => {
                debug!(%stage, attempt = n, "bounded: attempt succeeded");
                return Ok(value);
            }
            Err(e) if retryable(&e) => {
                warn!(%stage, attempt = n, limit, error = %e, "Attempt failed, retrying");
                last = e.to_string();
            }
            Err(e) => {
                debug!(%stage, attempt = n, error = %e, "bounded: terminal error");
                return Err(e);
            }
        }
    }
    Err(StageError::RetriesExhausted {
        stage,
        attempts: limit,
        last,
    })
}
