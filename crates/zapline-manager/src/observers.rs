// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of [`LifecycleObserver`]s.
//!
//! Notifications go to every observer in registration order. An observer
//! that returns an error or panics is logged and skipped; the remaining
//! observers and the triggering transition are unaffected.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use futures::FutureExt;
use tracing::warn;

use zapline_core::{DisconnectReason, InstanceRef, LifecycleObserver, ZaplineError};

type Observers = Mutex<BTreeMap<u64, Arc<dyn LifecycleObserver>>>;

/// Holds registered observers keyed by registration order.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: Arc<Observers>,
}

/// Handle returned by [`ObserverRegistry::register`].
///
/// Dropping it keeps the observer registered; call [`unregister`](Self::unregister).
#[derive(Debug)]
pub struct ObserverRegistration {
    id: u64,
    registry: Weak<Observers>,
}

impl ObserverRegistration {
    /// Remove the observer. Returns `false` if it was already gone.
    pub fn unregister(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|observers| lock(&observers).remove(&self.id).is_some())
    }
}

fn lock(observers: &Observers) -> MutexGuard<'_, BTreeMap<u64, Arc<dyn LifecycleObserver>>> {
    // No callback runs under this lock.
    observers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn LifecycleObserver>) -> ObserverRegistration {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.observers).insert(id, observer);
        ObserverRegistration {
            id,
            registry: Arc::downgrade(&self.observers),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.observers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn LifecycleObserver>> {
        lock(&self.observers).values().cloned().collect()
    }

    pub async fn notify_connected(&self, instance: &InstanceRef) {
        for observer in self.snapshot() {
            let outcome = AssertUnwindSafe(observer.on_connected(instance))
                .catch_unwind()
                .await;
            report(observer.name(), "on_connected", instance, outcome);
        }
    }

    pub async fn notify_disconnected(&self, instance: &InstanceRef, reason: &DisconnectReason) {
        for observer in self.snapshot() {
            let outcome = AssertUnwindSafe(observer.on_disconnected(instance, reason))
                .catch_unwind()
                .await;
            report(observer.name(), "on_disconnected", instance, outcome);
        }
    }

    pub async fn notify_reconnect_attempt(
        &self,
        instance: &InstanceRef,
        attempt: u32,
        delay: Duration,
    ) {
        for observer in self.snapshot() {
            let outcome = AssertUnwindSafe(observer.on_reconnect_attempt(instance, attempt, delay))
                .catch_unwind()
                .await;
            report(observer.name(), "on_reconnect_attempt", instance, outcome);
        }
    }
}

fn report(
    observer: &str,
    hook: &'static str,
    instance: &InstanceRef,
    outcome: std::thread::Result<Result<(), ZaplineError>>,
) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(
            observer,
            hook,
            instance_id = %instance.instance_id,
            tenant_id = %instance.tenant_id,
            error = %e,
            "lifecycle observer failed"
        ),
        Err(_) => warn!(
            observer,
            hook,
            instance_id = %instance.instance_id,
            tenant_id = %instance.tenant_id,
            "lifecycle observer panicked"
        ),
    }
}

#[cfg(test)]
mod tests {
    use zapline_core::{InstanceId, TenantId};
    use zapline_test_utils::{FailingObserver, Observed, PanickingObserver, RecordingObserver};

    use super::*;

    fn instance() -> InstanceRef {
        InstanceRef {
            instance_id: InstanceId::from("i-1"),
            tenant_id: TenantId::from("t-1"),
        }
    }

    #[tokio::test]
    async fn failures_and_panics_do_not_stop_later_observers() {
        let registry = ObserverRegistry::new();
        let recorder = Arc::new(RecordingObserver::new());
        registry.register(Arc::new(FailingObserver));
        registry.register(Arc::new(PanickingObserver));
        registry.register(recorder.clone());

        registry.notify_connected(&instance()).await;
        registry
            .notify_disconnected(&instance(), &DisconnectReason::ManualStop)
            .await;

        assert_eq!(
            recorder.seen().await,
            vec![
                Observed::Connected(InstanceId::from("i-1")),
                Observed::Disconnected(InstanceId::from("i-1"), DisconnectReason::ManualStop),
            ]
        );
    }

    #[tokio::test]
    async fn unregister_removes_observer() {
        let registry = ObserverRegistry::new();
        let recorder = Arc::new(RecordingObserver::new());
        let registration = registry.register(recorder.clone());
        assert_eq!(registry.len(), 1);

        assert!(registration.unregister());
        registry.notify_connected(&instance()).await;
        assert!(recorder.seen().await.is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn dropping_registration_keeps_observer() {
        let registry = ObserverRegistry::new();
        let recorder = Arc::new(RecordingObserver::new());
        drop(registry.register(recorder.clone()));

        registry
            .notify_reconnect_attempt(&instance(), 1, Duration::from_secs(2))
            .await;
        assert_eq!(recorder.reconnect_attempts().await, vec![(1, Duration::from_secs(2))]);
    }
}
