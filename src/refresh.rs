use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::k8s::{Accessor, ListRequest};
use crate::model::{ALL_NAMESPACES_LABEL, ResourceKind, TableData};
use crate::reconcile::{Reconciler, inject};

/// Delay before the first fetch of a freshly started task.
pub const FIRST_TICK: Duration = Duration::from_millis(100);

/// Cooperative cancellation flag shared between a view and its task.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

#[derive(Debug)]
pub struct RefreshUpdate {
    pub view_id: u64,
    pub token: CancelToken,
    pub result: Result<TableData, String>,
}

/// Reconciler owned by a view and lent to whichever task refreshes it, so a
/// restarted task diffs against the rows its predecessor last saw.
pub type SharedReconciler = Arc<Mutex<Reconciler>>;

#[derive(Clone)]
pub struct RefreshConfig {
    pub accessor: Arc<dyn Accessor>,
    pub tx: mpsc::UnboundedSender<RefreshUpdate>,
    pub interval: Duration,
}

/// Handle to a running refresh loop. Dropping it cancels the loop.
#[derive(Debug)]
pub struct RefreshTask {
    token: CancelToken,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub fn spawn(
        view_id: u64,
        request: ListRequest,
        reconciler: SharedReconciler,
        config: RefreshConfig,
    ) -> Self {
        let token = CancelToken::new();
        let handle = tokio::spawn(run_refresh(
            view_id,
            request,
            reconciler,
            config,
            token.clone(),
        ));
        debug!(view_id, "refresh task started");
        Self { token, handle }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

async fn run_refresh(
    view_id: u64,
    request: ListRequest,
    reconciler: SharedReconciler,
    config: RefreshConfig,
    token: CancelToken,
) {
    let mut delay = FIRST_TICK;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = config.interval;

        let fetched = tokio::select! {
            _ = token.cancelled() => break,
            fetched = config.accessor.list(&request) => fetched,
        };

        let result = match fetched {
            Ok(snapshot) => {
                let mut reconciler = reconciler.lock().unwrap_or_else(PoisonError::into_inner);
                // The view may have reset the reconciler for a new task.
                if token.is_cancelled() {
                    break;
                }
                let mut data = reconciler.reconcile(&request.scope, snapshot);
                if request.kind == ResourceKind::Namespaces {
                    inject(
                        &mut data,
                        ALL_NAMESPACES_LABEL,
                        vec![ALL_NAMESPACES_LABEL.to_string(), "Active".to_string()],
                    );
                }
                Ok(data)
            }
            Err(error) => {
                warn!(view_id, "refresh failed: {error:#}");
                Err(crate::compact_error(&error))
            }
        };

        if token.is_cancelled() {
            debug!(view_id, "discarding refresh for cancelled view");
            break;
        }
        let update = RefreshUpdate {
            view_id,
            token: token.clone(),
            result,
        };
        if config.tx.send(update).is_err() {
            break;
        }
    }

    debug!(view_id, "refresh task stopped");
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, RefreshConfig, RefreshTask, SharedReconciler};
    use crate::k8s::ListRequest;
    use crate::k8s::fake::{FakeAccessor, snapshot};
    use crate::model::{ResourceKind, RowAction, Scope};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn request(kind: ResourceKind, scope: Scope) -> ListRequest {
        ListRequest {
            kind,
            scope,
            labels: None,
        }
    }

    #[tokio::test]
    async fn cancel_token_resolves_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        assert!(!token.is_cancelled());
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
        assert!(token.same_as(&token.clone()));
        assert!(!token.same_as(&CancelToken::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn task_reconciles_successive_snapshots() {
        let accessor = FakeAccessor::new();
        accessor.queue(snapshot(&["NAME", "RESTARTS"], &[("ns/a", &["a", "0"])]));
        accessor.queue(snapshot(&["NAME", "RESTARTS"], &[("ns/a", &["a", "1"])]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = RefreshConfig {
            accessor: Arc::new(accessor),
            tx,
            interval: Duration::from_secs(2),
        };
        let scope = Scope::Namespace("ns".to_string());
        let task = RefreshTask::spawn(
            7,
            request(ResourceKind::Pods, scope),
            SharedReconciler::default(),
            config,
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.view_id, 7);
        assert!(first.token.same_as(task.token()));
        let data = first.result.unwrap();
        assert_eq!(data.rows["ns/a"].action, RowAction::Added);

        let second = rx.recv().await.unwrap().result.unwrap();
        assert_eq!(second.rows["ns/a"].action, RowAction::Modified);
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_task_continues_from_the_last_snapshot() {
        let accessor = Arc::new(FakeAccessor::with_rows(&["NAME"], &[("a", &["a"])]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = RefreshConfig {
            accessor,
            tx,
            interval: Duration::from_secs(1),
        };
        let reconciler = SharedReconciler::default();
        let nodes = || request(ResourceKind::Nodes, Scope::NotNamespaced);

        let first = RefreshTask::spawn(4, nodes(), reconciler.clone(), config.clone());
        let data = rx.recv().await.unwrap().result.unwrap();
        assert_eq!(data.rows["a"].action, RowAction::Added);
        drop(first);

        let _second = RefreshTask::spawn(4, nodes(), reconciler.clone(), config.clone());
        let data = rx.recv().await.unwrap().result.unwrap();
        assert_eq!(data.rows["a"].action, RowAction::Unchanged);

        reconciler.lock().unwrap().reset();
        let data = rx.recv().await.unwrap().result.unwrap();
        assert_eq!(data.rows["a"].action, RowAction::Added);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_are_reported_without_stopping() {
        let accessor = FakeAccessor::new();
        accessor.queue_error("connection refused");
        accessor.queue(snapshot(&["NAME"], &[("a", &["a"])]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = RefreshConfig {
            accessor: Arc::new(accessor),
            tx,
            interval: Duration::from_secs(1),
        };
        let _task = RefreshTask::spawn(
            1,
            request(ResourceKind::Nodes, Scope::NotNamespaced),
            SharedReconciler::default(),
            config,
        );

        let failed = rx.recv().await.unwrap();
        assert!(failed.result.unwrap_err().contains("connection refused"));
        let recovered = rx.recv().await.unwrap();
        assert!(recovered.result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn namespaces_view_keeps_an_all_row() {
        let accessor = FakeAccessor::new();
        accessor.queue(snapshot(&["NAME", "STATUS", "AGE"], &[("default", &["default", "Active", "1s"])]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = RefreshConfig {
            accessor: Arc::new(accessor),
            tx,
            interval: Duration::from_secs(1),
        };
        let _task = RefreshTask::spawn(
            2,
            request(ResourceKind::Namespaces, Scope::NotNamespaced),
            SharedReconciler::default(),
            config,
        );
        for _ in 0..2 {
            let data = rx.recv().await.unwrap().result.unwrap();
            assert_eq!(data.rows["all"].fields, vec!["all", "Active", ""]);
            assert!(data.rows.contains_key("default"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_task_stops_the_loop() {
        let accessor = Arc::new(FakeAccessor::with_rows(&["NAME"], &[("a", &["a"])]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = RefreshConfig {
            accessor: accessor.clone(),
            tx,
            interval: Duration::from_secs(1),
        };
        let task = RefreshTask::spawn(
            3,
            request(ResourceKind::Nodes, Scope::NotNamespaced),
            SharedReconciler::default(),
            config,
        );
        assert!(rx.recv().await.is_some());
        drop(task);
        assert!(rx.recv().await.is_none());
        let calls = accessor.request_count();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(accessor.request_count(), calls);
    }
}
