// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session store with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use zapline_core::{InstanceId, SessionCredentials, SessionStore, ZaplineError};

/// A [`SessionStore`] backed by a `HashMap`.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<InstanceId, SessionCredentials>>,
    saves: AtomicUsize,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    load_delay_ms: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed credentials as if the instance had paired before.
    pub async fn insert(&self, instance_id: &InstanceId, credentials: SessionCredentials) {
        self.entries
            .lock()
            .await
            .insert(instance_id.clone(), credentials);
    }

    pub async fn get(&self, instance_id: &InstanceId) -> Option<SessionCredentials> {
        self.entries.lock().await.get(instance_id).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every `load` take `delay` before answering.
    pub fn delay_loads(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.load_delay_ms.store(millis, Ordering::SeqCst);
    }
}

fn injected(operation: &str) -> ZaplineError {
    ZaplineError::Session {
        message: format!("injected {operation} failure"),
        source: None,
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(
        &self,
        instance_id: &InstanceId,
        credentials: &SessionCredentials,
    ) -> Result<(), ZaplineError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(injected("save"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.insert(instance_id, credentials.clone()).await;
        Ok(())
    }

    async fn load(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<SessionCredentials>, ZaplineError> {
        let delay = self.load_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(injected("load"));
        }
        Ok(self.get(instance_id).await)
    }

    async fn delete(&self, instance_id: &InstanceId) -> Result<(), ZaplineError> {
        self.entries.lock().await.remove(instance_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<InstanceId>, ZaplineError> {
        let mut ids: Vec<_> = self.entries.lock().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
