//! Correlation ids for tying log lines and error records to one operation
//!
//! The id lives in a tokio task-local, so it follows the future across
//! `.await` points and worker threads. Spawned tasks do not inherit it;
//! wrap their future in [`with_trace_id`] to carry it over.

use std::future::Future;
use uuid::Uuid;

tokio::task_local! {
    static TRACE_ID: String;
}

/// Generate a fresh correlation id
pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Correlation id of the current task, if one is set
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

/// Current correlation id, or a fresh one outside any scope
pub fn current_or_new() -> String {
    current_trace_id().unwrap_or_else(new_trace_id)
}

/// Run `future` with `id` as its correlation id
pub async fn with_trace_id<F: Future>(id: String, future: F) -> F::Output {
    TRACE_ID.scope(id, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scope_sets_and_clears_id() {
        assert!(current_trace_id().is_none());

        let seen = with_trace_id("abc".to_string(), async {
            tokio::task::yield_now().await;
            current_trace_id()
        })
        .await;

        assert_eq!(seen.as_deref(), Some("abc"));
        assert!(current_trace_id().is_none());
    }

    #[tokio::test]
    async fn test_nested_scope_shadows_outer() {
        with_trace_id("outer".to_string(), async {
            let inner = with_trace_id("inner".to_string(), async { current_trace_id() }).await;
            assert_eq!(inner.as_deref(), Some("inner"));
            assert_eq!(current_trace_id().as_deref(), Some("outer"));
        })
        .await;
    }

    #[test]
    fn test_current_or_new_outside_scope() {
        let a = current_or_new();
        let b = current_or_new();
        assert_ne!(a, b);
    }
}
