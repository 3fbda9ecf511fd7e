// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-aware instance lifecycle management for Zapline.
//!
//! [`InstanceManager`] owns every registered instance, supervises reconnects
//! after transient closures and fans lifecycle changes out to registered
//! [`LifecycleObserver`](zapline_core::LifecycleObserver)s and event
//! subscribers.

pub mod events;
pub mod manager;
pub mod observers;
pub mod reconnect;
pub mod shutdown;

pub use events::{EventBus, EventPayload, ZaplineEvent};
pub use manager::{InstanceManager, ManagerDeps};
pub use observers::{ObserverRegistration, ObserverRegistry};
pub use reconnect::{ReconnectPlan, ReconnectPolicy, ReconnectSupervisor};
pub use shutdown::{install_signal_handler, shutdown_on_signal};
