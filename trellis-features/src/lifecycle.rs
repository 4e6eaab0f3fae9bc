//! Feature Lifecycle
//!
//! Applies reconciled transitions through a [`FeatureLifecycleSink`] and
//! persists the resulting [`ShellState`] through a [`ShellStateStore`].
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use trellis_features::*;
//!
//! # tokio_test::block_on(async {
//! let manager = ShellFeatureManager::new(
//!     FeatureStateDiffer::new(),
//!     Arc::new(InMemoryShellStateStore::new()),
//!     Arc::new(LoggingLifecycleSink),
//! );
//!
//! let result = manager.reconcile(1, &[FeatureDescriptor::new("Blog")]).await.unwrap();
//! assert_eq!(result.transitions.len(), 2);
//! assert!(manager.state(1).await.unwrap().is_enabled("Blog"));
//! # });
//! ```

use crate::descriptor::FeatureDescriptor;
use crate::differ::{FeatureStateDiffer, Reconciliation};
use crate::error::FeatureError;
use crate::state::ShellState;
use crate::transition::Transition;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use trellis_log::{debug, info, warn};

/// Runs feature lifecycle hooks
///
/// Receives transitions one at a time in the order they must run.
#[async_trait]
pub trait FeatureLifecycleSink: Send + Sync {
    /// Run the hook for `transition` in shell `tenant_id`
    async fn apply(&self, tenant_id: u64, transition: &Transition) -> Result<(), FeatureError>;
}

/// Sink that only logs transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLifecycleSink;

#[async_trait]
impl FeatureLifecycleSink for LoggingLifecycleSink {
    async fn apply(&self, tenant_id: u64, transition: &Transition) -> Result<(), FeatureError> {
        info!(tenant_id, transition = %transition, "feature transition");
        Ok(())
    }
}

/// Persistence of shell feature state
///
/// `save` must replace the whole record atomically; readers never observe a
/// partially written feature list.
#[async_trait]
pub trait ShellStateStore: Send + Sync {
    /// Load the recorded state, `None` for a shell never reconciled
    async fn load(&self, tenant_id: u64) -> Result<Option<ShellState>, FeatureError>;

    /// Replace the recorded state
    async fn save(&self, state: &ShellState) -> Result<(), FeatureError>;
}

/// In-memory shell state store
#[derive(Debug, Default)]
pub struct InMemoryShellStateStore {
    states: RwLock<HashMap<u64, ShellState>>,
}

impl InMemoryShellStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShellStateStore for InMemoryShellStateStore {
    async fn load(&self, tenant_id: u64) -> Result<Option<ShellState>, FeatureError> {
        Ok(self.states.read().await.get(&tenant_id).cloned())
    }

    async fn save(&self, state: &ShellState) -> Result<(), FeatureError> {
        self.states
            .write()
            .await
            .insert(state.tenant_id, state.clone());
        Ok(())
    }
}

/// Reconciles shell feature state end to end
///
/// Calls for the same shell are serialized; different shells proceed in
/// parallel. A shell's lock lives only while calls for it are in flight.
pub struct ShellFeatureManager {
    differ: FeatureStateDiffer,
    store: Arc<dyn ShellStateStore>,
    sink: Arc<dyn FeatureLifecycleSink>,
    locks: parking_lot::Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl ShellFeatureManager {
    /// Create a manager
    pub fn new(
        differ: FeatureStateDiffer,
        store: Arc<dyn ShellStateStore>,
        sink: Arc<dyn FeatureLifecycleSink>,
    ) -> Self {
        Self {
            differ,
            store,
            sink,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Differ in use
    pub fn differ(&self) -> &FeatureStateDiffer {
        &self.differ
    }

    /// Recorded state of a shell, empty when never reconciled
    pub async fn state(&self, tenant_id: u64) -> Result<ShellState, FeatureError> {
        Ok(self
            .store
            .load(tenant_id)
            .await?
            .unwrap_or_else(|| ShellState::new(tenant_id)))
    }

    /// Bring shell `tenant_id` to exactly the `desired` features.
    ///
    /// Transitions run in order; the next state is saved only after all of
    /// them succeed. On any failure the previously saved state stays
    /// authoritative and the error is returned unchanged.
    pub async fn reconcile(
        &self,
        tenant_id: u64,
        desired: &[FeatureDescriptor],
    ) -> Result<Reconciliation, FeatureError> {
        let lock = self.tenant_lock(tenant_id);
        let result = {
            let _guard = lock.lock().await;
            self.reconcile_locked(tenant_id, desired).await
        };
        self.release_lock(tenant_id, lock);
        result
    }

    /// Uninstall recorded, disabled features of shell `tenant_id`
    pub async fn uninstall(&self, tenant_id: u64, features: &[&str]) -> Result<Reconciliation, FeatureError> {
        let lock = self.tenant_lock(tenant_id);
        let result = {
            let _guard = lock.lock().await;
            self.uninstall_locked(tenant_id, features).await
        };
        self.release_lock(tenant_id, lock);
        result
    }

    async fn reconcile_locked(
        &self,
        tenant_id: u64,
        desired: &[FeatureDescriptor],
    ) -> Result<Reconciliation, FeatureError> {
        let previous = self.state(tenant_id).await?;
        let result = self.differ.reconcile(&previous, desired)?;
        self.commit(tenant_id, result).await
    }

    async fn uninstall_locked(&self, tenant_id: u64, features: &[&str]) -> Result<Reconciliation, FeatureError> {
        let previous = self.state(tenant_id).await?;
        let result = self.differ.uninstall(&previous, features)?;
        self.commit(tenant_id, result).await
    }

    async fn commit(&self, tenant_id: u64, result: Reconciliation) -> Result<Reconciliation, FeatureError> {
        for (applied, transition) in result.transitions.iter().enumerate() {
            if let Err(err) = self.sink.apply(tenant_id, transition).await {
                warn!(
                    tenant_id,
                    transition = %transition,
                    applied,
                    error = %err,
                    "feature transition failed, keeping previous state"
                );
                return Err(err);
            }
        }

        self.store.save(&result.state).await?;
        debug!(
            tenant_id,
            transitions = result.transitions.len(),
            features = result.state.features.len(),
            "saved shell feature state"
        );
        Ok(result)
    }

    fn tenant_lock(&self, tenant_id: u64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(tenant_id).or_default())
    }

    // Clones are only handed out under the map lock, so a count of one
    // means no caller holds or waits on this shell's lock.
    fn release_lock(&self, tenant_id: u64, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks
            .get(&tenant_id)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            locks.remove(&tenant_id);
        }
    }
}

impl std::fmt::Debug for ShellFeatureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellFeatureManager")
            .field("differ", &self.differ)
            .field("active_tenants", &self.locks.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        applied: parking_lot::Mutex<Vec<(u64, Transition)>>,
        fail_on: Option<Transition>,
        in_flight: AtomicUsize,
        overlapped: AtomicUsize,
    }

    #[async_trait]
    impl FeatureLifecycleSink for RecordingSink {
        async fn apply(&self, tenant_id: u64, transition: &Transition) -> Result<(), FeatureError> {
            if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.fetch_add(1, Ordering::SeqCst);
            }
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.as_ref() == Some(transition) {
                return Err(FeatureError::Lifecycle {
                    feature: transition.feature_id.clone(),
                    message: "hook failed".to_string(),
                });
            }
            self.applied.lock().push((tenant_id, transition.clone()));
            Ok(())
        }
    }

    fn manager(sink: Arc<RecordingSink>) -> (ShellFeatureManager, Arc<InMemoryShellStateStore>) {
        let store = Arc::new(InMemoryShellStateStore::new());
        let manager = ShellFeatureManager::new(FeatureStateDiffer::new(), store.clone(), sink);
        (manager, store)
    }

    #[tokio::test]
    async fn test_fresh_shell_starts_empty() {
        let (manager, _) = manager(Arc::new(RecordingSink::default()));
        assert_eq!(manager.state(9).await.unwrap(), ShellState::new(9));
    }

    #[tokio::test]
    async fn test_reconcile_applies_and_persists() {
        let sink = Arc::new(RecordingSink::default());
        let (manager, store) = manager(sink.clone());

        manager.reconcile(1, &[FeatureDescriptor::new("Blog")]).await.unwrap();
        let desired = [
            FeatureDescriptor::new("Blog"),
            FeatureDescriptor::new("Comments").with_dependency("Blog"),
        ];
        manager.reconcile(1, &desired).await.unwrap();

        let applied: Vec<Transition> = sink.applied.lock().iter().map(|(_, t)| t.clone()).collect();
        assert_eq!(
            applied,
            vec![
                Transition::install("Blog"),
                Transition::enable("Blog"),
                Transition::install("Comments"),
                Transition::enable("Comments"),
            ]
        );

        let saved = store.load(1).await.unwrap().unwrap();
        assert!(saved.is_enabled("Comments"));
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_previous_state() {
        let sink = Arc::new(RecordingSink {
            fail_on: Some(Transition::enable("Comments")),
            ..Default::default()
        });
        let (manager, store) = manager(sink.clone());
        manager.reconcile(1, &[FeatureDescriptor::new("Blog")]).await.unwrap();
        let before = store.load(1).await.unwrap();

        let desired = [
            FeatureDescriptor::new("Blog"),
            FeatureDescriptor::new("Comments").with_dependency("Blog"),
        ];
        let err = manager.reconcile(1, &desired).await.unwrap_err();

        assert!(matches!(err, FeatureError::Lifecycle { ref feature, .. } if feature == "Comments"));
        assert_eq!(store.load(1).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_configuration_error_applies_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let (manager, store) = manager(sink.clone());

        let desired = [
            FeatureDescriptor::new("F").with_dependency("G"),
            FeatureDescriptor::new("G").with_dependency("F"),
        ];
        let err = manager.reconcile(1, &desired).await.unwrap_err();

        assert!(err.is_configuration_error());
        assert!(sink.applied.lock().is_empty());
        assert!(store.load(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_uninstall_after_disable() {
        let sink = Arc::new(RecordingSink::default());
        let (manager, _) = manager(sink.clone());

        manager.reconcile(1, &[FeatureDescriptor::new("Blog")]).await.unwrap();
        assert!(matches!(
            manager.uninstall(1, &["Blog"]).await,
            Err(FeatureError::StillEnabled(_))
        ));

        manager.reconcile(1, &[]).await.unwrap();
        let result = manager.uninstall(1, &["Blog"]).await.unwrap();

        assert_eq!(result.transitions, vec![Transition::uninstall("Blog")]);
        assert!(!manager.state(1).await.unwrap().contains("Blog"));
    }

    #[tokio::test]
    async fn test_same_shell_is_serialized() {
        let sink = Arc::new(RecordingSink::default());
        let (manager, _) = manager(sink.clone());
        let manager = Arc::new(manager);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    let desired = if i % 2 == 0 {
                        vec![FeatureDescriptor::new("Blog")]
                    } else {
                        Vec::new()
                    };
                    manager.reconcile(1, &desired).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(sink.overlapped.load(Ordering::SeqCst), 0);
        // Each run starts from the state the previous one saved.
        let installs = sink
            .applied
            .lock()
            .iter()
            .filter(|(_, t)| *t == Transition::install("Blog"))
            .count();
        assert_eq!(installs, 1);
    }

    #[tokio::test]
    async fn test_tenant_locks_are_released() {
        let sink = Arc::new(RecordingSink::default());
        let (manager, _) = manager(sink.clone());
        let manager = Arc::new(manager);

        let handles: Vec<_> = (1..=8u64)
            .map(|tenant| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.reconcile(tenant % 3, &[FeatureDescriptor::new("Blog")]).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(manager.locks.lock().is_empty());

        let cycle = [
            FeatureDescriptor::new("F").with_dependency("G"),
            FeatureDescriptor::new("G").with_dependency("F"),
        ];
        assert!(manager.reconcile(4, &cycle).await.is_err());
        assert!(manager.uninstall(4, &["Blog"]).await.is_err());
        assert!(manager.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_shells_are_independent() {
        let sink = Arc::new(RecordingSink::default());
        let (manager, _) = manager(sink.clone());

        manager.reconcile(1, &[FeatureDescriptor::new("Blog")]).await.unwrap();
        manager.reconcile(2, &[FeatureDescriptor::new("Media")]).await.unwrap();

        assert!(manager.state(1).await.unwrap().is_enabled("Blog"));
        assert!(!manager.state(2).await.unwrap().contains("Blog"));
        assert!(
            sink.applied
                .lock()
                .iter()
                .any(|(tenant, t)| *tenant == 2 && *t == Transition::install("Media"))
        );
    }
}
