// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the seams of the instance lifecycle.
//!
//! All traits use `#[async_trait]` so they can be held as trait objects.

pub mod media;
pub mod observer;
pub mod protocol;
pub mod session_store;

pub use media::MediaStorage;
pub use observer::LifecycleObserver;
pub use protocol::{VendorConnection, VendorConnector, VendorSession};
pub use session_store::SessionStore;
