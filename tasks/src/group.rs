//! Fan-out/fan-in over a [`JoinSet`].
//!
//! Children run concurrently and results are collected in completion order,
//! not submission order. Dropping the returned future aborts every child still
//! running.

use std::fmt::Display;
use std::future::Future;

use tokio::task::{JoinError, JoinSet};

fn spawn_all<I, F, T>(futures: I) -> JoinSet<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    for future in futures {
        set.spawn(future);
    }
    set
}

/// A panicking child re-raises in the parent. Cancellation is only possible
/// through our own abort, so it is skipped.
fn surface(error: JoinError) {
    if error.is_panic() {
        std::panic::resume_unwind(error.into_panic());
    }
    tracing::debug!("task group child cancelled");
}

/// Throwing group: every child must succeed.
///
/// The first error aborts the remaining children and is returned as-is.
pub async fn try_join_all<I, F, T, E>(futures: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let mut set = spawn_all(futures);
    let mut results = Vec::with_capacity(set.len());

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(error)) => {
                tracing::debug!(
                    remaining = set.len(),
                    "task group child failed; cancelling siblings"
                );
                set.abort_all();
                return Err(error);
            }
            Err(error) => surface(error),
        }
    }

    Ok(results)
}

/// Non-throwing group: failed children are logged and skipped.
pub async fn join_successes<I, F, T, E>(futures: I) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let mut set = spawn_all(futures);
    let mut results = Vec::with_capacity(set.len());

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(error)) => tracing::debug!(%error, "task group child failed; skipping"),
            Err(error) => surface(error),
        }
    }

    results
}
