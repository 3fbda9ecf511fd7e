// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for manager-level integration tests.
//!
//! `TestHarness` wires an [`InstanceManager`] to a mock connector, an
//! in-memory session store, mock media storage and a recording observer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use zapline_config::{Environment, ReconnectConfig, ZaplineConfig};
use zapline_core::{Instance, MediaStorage, SessionStore, TenantId, ZaplineError};
use zapline_manager::{EventPayload, InstanceManager, ManagerDeps, ObserverRegistration, ZaplineEvent};

use crate::memory_store::InMemorySessionStore;
use crate::mock_media::MockMediaStorage;
use crate::mock_vendor::MockConnector;
use crate::observer::RecordingObserver;

/// How long [`TestHarness::next_event`] waits before giving up.
const EVENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ZaplineConfig,
    with_store: bool,
    with_media: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ZaplineConfig::default();
        config.manager.environment = Environment::Production;
        Self {
            config,
            with_store: true,
            with_media: true,
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.reconnect.max_attempts = max_attempts;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.config.manager.environment = environment;
        self
    }

    /// Build without a pluggable session store.
    pub fn without_session_store(mut self) -> Self {
        self.with_store = false;
        self
    }

    pub fn without_media_storage(mut self) -> Self {
        self.with_media = false;
        self
    }

    /// Build the harness. Fails where the manager itself refuses to start.
    pub fn build(self) -> Result<TestHarness, ZaplineError> {
        let connector = Arc::new(MockConnector::new());
        let store = Arc::new(InMemorySessionStore::new());
        let media = Arc::new(MockMediaStorage::new());

        let manager = InstanceManager::new(
            &self.config,
            ManagerDeps {
                connector: Arc::clone(&connector) as _,
                session_store: self
                    .with_store
                    .then(|| Arc::clone(&store) as Arc<dyn SessionStore>),
                media_storage: self
                    .with_media
                    .then(|| Arc::clone(&media) as Arc<dyn MediaStorage>),
            },
        )?;

        let observer = Arc::new(RecordingObserver::new());
        let registration = manager.observers().register(Arc::clone(&observer) as _);
        let events = manager.subscribe();

        Ok(TestHarness {
            manager,
            connector,
            store,
            media,
            observer,
            registration: Some(registration),
            events,
        })
    }
}

/// A manager with mock collaborators and a recording observer.
pub struct TestHarness {
    pub manager: InstanceManager,
    pub connector: Arc<MockConnector>,
    pub store: Arc<InMemorySessionStore>,
    pub media: Arc<MockMediaStorage>,
    pub observer: Arc<RecordingObserver>,
    registration: Option<ObserverRegistration>,
    events: broadcast::Receiver<ZaplineEvent>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with the default reconnect policy (2s initial, x2, 10 attempts).
    pub fn new() -> Result<Self, ZaplineError> {
        Self::builder().build()
    }

    pub async fn create(&self, tenant: &str, name: &str) -> Instance {
        self.manager
            .create_instance(TenantId::from(tenant), name, None)
            .await
            .expect("create_instance failed")
    }

    /// Next event published by the manager.
    pub async fn next_event(&mut self) -> ZaplineEvent {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event bus closed or lagged")
    }

    /// Skip events until one matches `predicate`, and return it.
    pub async fn wait_for_event(
        &mut self,
        predicate: impl Fn(&EventPayload) -> bool,
    ) -> ZaplineEvent {
        loop {
            let event = self.next_event().await;
            if predicate(&event.payload) {
                return event;
            }
        }
    }

    /// Drain every event published so far without waiting.
    pub fn drain_events(&mut self) -> Vec<ZaplineEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Stop recording lifecycle notifications.
    pub fn detach_observer(&mut self) -> bool {
        self.registration
            .take()
            .is_some_and(ObserverRegistration::unregister)
    }
}
