// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Zapline integration tests.
//!
//! Provides mock implementations of the vendor connector, session store,
//! media storage and lifecycle observers, plus a [`TestHarness`] that wires
//! them to an instance manager.

pub mod harness;
pub mod memory_store;
pub mod mock_media;
pub mod mock_vendor;
pub mod observer;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_store::InMemorySessionStore;
pub use mock_media::MockMediaStorage;
pub use mock_vendor::{ConnectCall, MockConnector, MockSession, MockSessionHandle, SentMedia, SentText};
pub use observer::{FailingObserver, Observed, PanickingObserver, RecordingObserver};
