// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passive lifecycle hooks for other subsystems.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ZaplineError;
use crate::types::{DisconnectReason, InstanceRef};

/// Subscriber notified of connect, disconnect and reconnect-attempt signals.
///
/// Every method defaults to a no-op, so implementors override only what they
/// need. Returned errors are logged by the registry and never influence the
/// transition that triggered the notification.
#[async_trait]
pub trait LifecycleObserver: Send + Sync + 'static {
    /// Name used in logs when the observer fails.
    fn name(&self) -> &str {
        "observer"
    }

    async fn on_connected(&self, _instance: &InstanceRef) -> Result<(), ZaplineError> {
        Ok(())
    }

    async fn on_disconnected(
        &self,
        _instance: &InstanceRef,
        _reason: &DisconnectReason,
    ) -> Result<(), ZaplineError> {
        Ok(())
    }

    /// Called before the reconnect timer for `attempt` is armed.
    async fn on_reconnect_attempt(
        &self,
        _instance: &InstanceRef,
        _attempt: u32,
        _delay: Duration,
    ) -> Result<(), ZaplineError> {
        Ok(())
    }
}
