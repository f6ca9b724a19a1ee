//! Chunked application of an async worker over a large item list.
//!
//! The walk can surface tens of thousands of files; materializing all of
//! their contents at once is rejected outright. Instead items are
//! processed in fixed-size chunks with a cooperative yield between
//! chunks, keeping memory bounded and the scheduler responsive.

use std::future::Future;

use anyhow::Result;
use futures::future::join_all;
use tracing::warn;

/// Runs `worker` over `items` in chunks of `chunk_size`.
///
/// Within a chunk all workers run concurrently and are awaited together
/// before the next chunk starts. A worker error is logged and contributes
/// nothing; `Ok(None)` is silently skipped. Only `Ok(Some(_))` values are
/// collected, in item order within each chunk.
pub async fn run_chunked<T, R, F, Fut>(items: Vec<T>, chunk_size: usize, worker: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<Option<R>>>,
{
    let chunk_size = chunk_size.max(1);
    let mut results = Vec::new();
    let mut remaining = items.into_iter();

    loop {
        let chunk: Vec<T> = remaining.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }

        for outcome in join_all(chunk.into_iter().map(&worker)).await {
            match outcome {
                Ok(Some(value)) => results.push(value),
                Ok(None) => {}
                Err(error) => warn!(?error, "batch worker failed; item dropped"),
            }
        }

        // Yield between chunks so a huge batch cannot monopolize the
        // executor.
        tokio::task::yield_now().await;
    }

    results
}
