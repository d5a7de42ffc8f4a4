//! Store access from async code.

use std::sync::Arc;

use p2pd_storage::{NodeSpecStore, StoreError, StoreResult};

/// Run `f` against `store` on the blocking pool.
///
/// Store writes commit with an fsync and must stay off the runtime workers.
pub(crate) async fn with_store<T, F>(store: &Arc<dyn NodeSpecStore>, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn NodeSpecStore) -> StoreResult<T> + Send + 'static,
{
    let store = store.clone();
    match tokio::task::spawn_blocking(move || f(store.as_ref())).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(StoreError::Database(format!("store task cancelled: {err}"))),
    }
}
