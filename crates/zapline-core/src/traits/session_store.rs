// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence of opaque per-instance credentials.

use async_trait::async_trait;

use crate::error::ZaplineError;
use crate::types::{InstanceId, SessionCredentials};

/// Stores the vendor credential blob of each instance.
///
/// Implementations must tolerate deleting or loading an id that was never saved.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Persists (or replaces) the credentials of an instance.
    async fn save(
        &self,
        instance_id: &InstanceId,
        credentials: &SessionCredentials,
    ) -> Result<(), ZaplineError>;

    /// Returns the stored credentials, or `None` if the instance never paired.
    async fn load(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Option<SessionCredentials>, ZaplineError>;

    /// Removes any stored credentials. Succeeds when nothing is stored.
    async fn delete(&self, instance_id: &InstanceId) -> Result<(), ZaplineError>;

    /// Lists every instance id that currently has stored credentials.
    async fn list(&self) -> Result<Vec<InstanceId>, ZaplineError>;
}
