// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Zapline.
//!
//! This crate provides the error type, the shared data model, the vendor
//! payload types, and the collaborator traits (session store, vendor
//! connector, media storage, lifecycle observer) that the adapter and
//! manager crates are written against.

pub mod error;
pub mod traits;
pub mod types;
pub mod vendor;

// Re-export key items at crate root for ergonomic imports.
pub use error::ZaplineError;
pub use types::{
    ConnectionStatus, DisconnectReason, Instance, InstanceId, InstanceRef, MessageType,
    NormalizedMessage, SendReceipt, SessionCredentials, TenantId,
};

pub use traits::{
    LifecycleObserver, MediaStorage, SessionStore, VendorConnection, VendorConnector,
    VendorSession,
};
