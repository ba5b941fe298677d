//! Bounded concurrent fan-out over catalog calls
//!
//! One semaphore bounds how many items are in flight at once; every item
//! is attempted even when siblings fail. Callers fold the returned
//! per-item outcomes into a stage report.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Run `op` over every item with at most `max_in_flight` concurrently
/// active. Outcomes come back in completion order, not input order.
pub async fn for_each_bounded<T, F, Fut, R>(max_in_flight: usize, items: Vec<T>, op: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut tasks = JoinSet::new();

    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let work = op(item);
        tasks.spawn(async move {
            // Never closed, so acquisition only fails on a dropped runtime.
            let _permit = semaphore.acquire().await.expect("semaphore closed");
            work.await
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!(error = %e, "fan-out task aborted"),
        }
    }
    outcomes
}
