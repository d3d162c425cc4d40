//! Callback delivery for callers that do not `.await`.
//!
//! Every storage operation is an `async fn`; the future it returns is the
//! pending result. [`spawn_with_callback`] is the other calling
//! convention: it drives the same future on the Tokio runtime and hands
//! the outcome to a completion callback. Semantics and error kinds are
//! identical in both forms.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::StorageResult;

/// Spawns `operation` and passes its result to `callback` when it
/// completes.
///
/// The returned handle resolves after the callback has run.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn spawn_with_callback<F, T, C>(operation: F, callback: C) -> JoinHandle<()>
where
    F: Future<Output = StorageResult<T>> + Send + 'static,
    T: Send + 'static,
    C: FnOnce(StorageResult<T>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = operation.await;
        callback(result);
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;
    use crate::error::StorageError;

    #[tokio::test]
    async fn callback_receives_success() {
        let (tx, rx) = oneshot::channel();
        let handle = spawn_with_callback(async { Ok(7_u32) }, move |result| {
            let _ = tx.send(result);
        });
        assert!(handle.await.is_ok());
        assert_eq!(rx.await.ok(), Some(Ok(7)));
    }

    #[tokio::test]
    async fn callback_receives_error_kind_unchanged() {
        let (tx, rx) = oneshot::channel();
        let op = async {
            Err::<(), _>(StorageError::NotFound {
                collection: "users".to_string(),
                id: "missing".to_string(),
            })
        };
        let _ = spawn_with_callback(op, move |result| {
            let _ = tx.send(result);
        })
        .await;
        let Ok(Err(err)) = rx.await else {
            panic!("callback should receive the error");
        };
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn callback_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let _ = spawn_with_callback(async { Ok(()) }, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
