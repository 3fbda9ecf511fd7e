// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle observers for assertions.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use zapline_core::{DisconnectReason, InstanceId, InstanceRef, LifecycleObserver, ZaplineError};

/// One notification received by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Connected(InstanceId),
    Disconnected(InstanceId, DisconnectReason),
    ReconnectAttempt(InstanceId, u32, Duration),
}

/// Records every notification in arrival order.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seen(&self) -> Vec<Observed> {
        self.seen.lock().await.clone()
    }

    pub async fn reconnect_attempts(&self) -> Vec<(u32, Duration)> {
        self.seen
            .lock()
            .await
            .iter()
            .filter_map(|o| match o {
                Observed::ReconnectAttempt(_, attempt, delay) => Some((*attempt, *delay)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl LifecycleObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_connected(&self, instance: &InstanceRef) -> Result<(), ZaplineError> {
        self.seen
            .lock()
            .await
            .push(Observed::Connected(instance.instance_id.clone()));
        Ok(())
    }

    async fn on_disconnected(
        &self,
        instance: &InstanceRef,
        reason: &DisconnectReason,
    ) -> Result<(), ZaplineError> {
        self.seen.lock().await.push(Observed::Disconnected(
            instance.instance_id.clone(),
            reason.clone(),
        ));
        Ok(())
    }

    async fn on_reconnect_attempt(
        &self,
        instance: &InstanceRef,
        attempt: u32,
        delay: Duration,
    ) -> Result<(), ZaplineError> {
        self.seen.lock().await.push(Observed::ReconnectAttempt(
            instance.instance_id.clone(),
            attempt,
            delay,
        ));
        Ok(())
    }
}

/// Fails every notification.
pub struct FailingObserver;

#[async_trait]
impl LifecycleObserver for FailingObserver {
    fn name(&self) -> &str {
        "failing"
    }

    async fn on_connected(&self, _instance: &InstanceRef) -> Result<(), ZaplineError> {
        Err(ZaplineError::Observer("on_connected failed".into()))
    }

    async fn on_disconnected(
        &self,
        _instance: &InstanceRef,
        _reason: &DisconnectReason,
    ) -> Result<(), ZaplineError> {
        Err(ZaplineError::Observer("on_disconnected failed".into()))
    }
}

/// Panics on every connect notification.
pub struct PanickingObserver;

#[async_trait]
impl LifecycleObserver for PanickingObserver {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn on_connected(&self, _instance: &InstanceRef) -> Result<(), ZaplineError> {
        panic!("observer panicked on purpose");
    }
}
