//! Background task lifecycle tracking

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::task::JoinHandle;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);
static ACTIVE_TASKS: AtomicU64 = AtomicU64::new(0);

/// Number of tracked tasks that have not completed yet
pub fn active_task_count() -> u64 {
    ACTIVE_TASKS.load(Ordering::Relaxed)
}

struct ActiveGuard;

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE_TASKS.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Spawn an instrumented task
///
/// Logs spawn and completion at trace/debug level. Aborted tasks still
/// decrement the active counter.
///
/// ```rust,no_run
/// # use fabric::debug::spawn_tracked;
/// # async fn refresh() {}
/// # async fn run() {
/// let handle = spawn_tracked("balance_refresh", async move {
///     refresh().await;
/// });
/// handle.abort();
/// # }
/// ```
pub fn spawn_tracked<F>(name: &'static str, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let task_id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
    ACTIVE_TASKS.fetch_add(1, Ordering::Relaxed);
    let active = ActiveGuard;
    let start = Instant::now();

    tracing::trace!(task = %name, task_id, "Task spawned");

    tokio::spawn(async move {
        let _active = active;
        let result = future.await;
        tracing::debug!(
            task = %name,
            task_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Task completed"
        );
        result
    })
}
