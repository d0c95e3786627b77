use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use super::types::{Task, TaskResult};

/// Dispatch one batch of tasks concurrently and collect every result.
///
/// At most `max_concurrency` dispatches are in flight at once. Results come
/// back in completion order.
pub async fn execute_batch<F, Fut>(
    tasks: Vec<Task>,
    max_concurrency: usize,
    dispatch: F,
) -> Vec<TaskResult>
where
    F: Fn(Task) -> Fut,
    Fut: Future<Output = TaskResult>,
{
    let sem = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futs = FuturesUnordered::new();

    for task in tasks {
        let sem = sem.clone();
        let fut = dispatch(task.clone());

        futs.push(async move {
            match sem.acquire_owned().await {
                Ok(_permit) => fut.await,
                Err(_) => TaskResult::failure(&task.id, "semaphore closed unexpectedly", 0),
            }
        });
    }

    let mut results = Vec::with_capacity(futs.len());
    while let Some(result) = futs.next().await {
        results.push(result);
    }
    results
}
