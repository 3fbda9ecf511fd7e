// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal-driven graceful shutdown.
//!
//! SIGTERM and SIGINT (Ctrl+C) cancel a [`CancellationToken`];
//! [`shutdown_on_signal`] then stops every instance through the manager.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::InstanceManager;

/// Installs handlers for SIGTERM and SIGINT.
///
/// The returned token is cancelled when either signal arrives. If the
/// SIGTERM handler cannot be installed, only Ctrl+C is watched.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, watching Ctrl+C only");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT (Ctrl+C), initiating shutdown");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, initiating shutdown"),
        Err(e) => warn!(error = %e, "failed to listen for Ctrl+C, shutting down"),
    }
}

/// Waits for `token`, then shuts the manager down.
///
/// Gives up waiting on instances after `timeout`; they are abandoned, not
/// forcibly closed.
pub async fn shutdown_on_signal(
    manager: InstanceManager,
    token: CancellationToken,
    timeout: Duration,
) {
    token.cancelled().await;
    if tokio::time::timeout(timeout, manager.shutdown()).await.is_err() {
        warn!(
            timeout_secs = timeout.as_secs(),
            "instances did not stop before the shutdown timeout"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;
    use zapline_config::ZaplineConfig;
    use zapline_core::{ConnectionStatus, SessionStore, TenantId};
    use zapline_test_utils::{InMemorySessionStore, MockConnector, MockSessionHandle};

    use super::*;
    use crate::events::EventPayload;
    use crate::manager::ManagerDeps;

    async fn connected_manager(count: usize) -> (InstanceManager, Vec<MockSessionHandle>) {
        let connector = Arc::new(MockConnector::new());
        let manager = InstanceManager::new(
            &ZaplineConfig::default(),
            ManagerDeps {
                connector: connector.clone(),
                session_store: Some(Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>),
                media_storage: None,
            },
        )
        .unwrap();
        let mut events = manager.subscribe();

        let mut sessions = Vec::new();
        for index in 0..count {
            let instance = manager
                .create_instance(TenantId::from("tenant-a"), &format!("line {index}"), None)
                .await
                .unwrap();
            manager.start_instance(&instance.id).await.unwrap();
            let session = connector.wait_for_session(index).await;
            session.open("15550001@s.whatsapp.net").await;
            loop {
                let event = events.recv().await.unwrap();
                if matches!(event.payload, EventPayload::InstanceConnected { .. })
                    && event.instance_id == instance.id
                {
                    break;
                }
            }
            sessions.push(session);
        }
        (manager, sessions)
    }

    #[tokio::test]
    async fn token_starts_uncancelled() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_stops_every_instance() {
        let (manager, sessions) = connected_manager(2).await;
        let token = CancellationToken::new();

        let waiter = tokio::spawn(shutdown_on_signal(
            manager.clone(),
            token.clone(),
            Duration::from_secs(5),
        ));
        tokio::task::yield_now().await;
        assert!(!manager.is_shutting_down());

        token.cancel();
        waiter.await.unwrap();

        assert!(manager.is_shutting_down());
        let instances = manager.get_all_instances().await;
        assert_eq!(instances.len(), 2);
        assert!(
            instances
                .iter()
                .all(|i| i.status == ConnectionStatus::Disconnected)
        );
        assert!(sessions.iter().all(|s| s.session.is_closed()));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn hung_stop_gives_up_after_timeout() {
        let (manager, sessions) = connected_manager(1).await;
        sessions[0].session.hang_on_close(true);
        let token = CancellationToken::new();
        token.cancel();

        let started = tokio::time::Instant::now();
        shutdown_on_signal(manager, token, Duration::from_secs(5)).await;

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(sessions[0].session.is_closed());
        assert!(logs_contain("did not stop before the shutdown timeout"));
    }
}
