// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for Zapline.

use thiserror::Error;

use crate::types::{ConnectionStatus, InstanceId};
use crate::vendor::VendorError;

/// The primary error type used across all Zapline crates.
#[derive(Debug, Error)]
pub enum ZaplineError {
    /// Configuration errors. Fatal when raised while constructing the manager.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested instance id is not registered.
    #[error("instance not found: {instance_id}")]
    InstanceNotFound { instance_id: InstanceId },

    /// A send was attempted while the instance was not connected.
    #[error("instance {instance_id} is not connected (status: {status})")]
    NotConnected {
        instance_id: InstanceId,
        status: ConnectionStatus,
    },

    /// The vendor session could not be established or resumed.
    #[error("failed to initialize instance {instance_id}: {message}")]
    Initialization {
        instance_id: InstanceId,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error returned by the vendor protocol library, passed through unchanged.
    #[error(transparent)]
    Vendor(#[from] VendorError),

    /// Session store errors (filesystem, database, serialization).
    #[error("session store error: {message}")]
    Session {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Media download or storage errors.
    #[error("media error: {message}")]
    Media {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A lifecycle observer failed while handling a signal.
    #[error("observer error: {0}")]
    Observer(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ZaplineError {
    /// Builds a [`ZaplineError::Session`] wrapping an underlying error.
    pub fn session<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ZaplineError::Session {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds a [`ZaplineError::Media`] wrapping an underlying error.
    pub fn media<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ZaplineError::Media {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns `true` for errors that mean "no such instance".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ZaplineError::InstanceNotFound { .. })
    }
}
