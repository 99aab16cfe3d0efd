//! Bounded parallel execution of per-item operations
//!
//! Convergence regularly needs the same remote operation applied to every
//! element of a collection (describe every server group, delete every
//! orphaned listener). Running them strictly sequentially is slow; running
//! them all at once trips provider rate limits. [`fan_out`] runs them
//! concurrently under a hard ceiling and reports per-item failures without
//! losing track of which item each failure belongs to.

use futures::stream::{self, StreamExt};

use crate::error::Error;
use crate::Result;

/// Run `work` over every item with at most `limit` operations in flight.
///
/// Results come back in item order regardless of completion order. If any
/// sub-operation fails, the whole call fails with [`Error::Aggregate`]
/// carrying every `(item index, error)` pair; sub-operations already in
/// flight still run to completion first.
///
/// An empty input succeeds immediately without invoking `work`. A `limit`
/// of zero is rejected even for empty input.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, limit: usize, work: F) -> Result<Vec<R>>
where
    F: Fn(usize, T) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    if limit == 0 {
        return Err(Error::InvalidConcurrencyLimit { limit });
    }
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let total = items.len();
    let mut completed: Vec<(usize, Result<R>)> =
        stream::iter(items.into_iter().enumerate().map(|(index, item)| {
            let sub_operation = work(index, item);
            async move { (index, sub_operation.await) }
        }))
        .buffer_unordered(limit)
        .collect()
        .await;

    completed.sort_by_key(|(index, _)| *index);

    let mut failures = Vec::new();
    let mut results = Vec::with_capacity(total);
    for (index, outcome) in completed {
        match outcome {
            Ok(value) => results.push(value),
            Err(error) => failures.push((index, error)),
        }
    }

    if failures.is_empty() {
        Ok(results)
    } else {
        Err(Error::aggregate(failures))
    }
}
