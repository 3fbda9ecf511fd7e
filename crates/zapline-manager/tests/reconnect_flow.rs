// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnect supervision driven through the manager with a paused clock.

use std::time::Duration;

use tokio::time::Instant;

use zapline_core::vendor::VendorError;
use zapline_core::{ConnectionStatus, DisconnectReason};
use zapline_manager::EventPayload;
use zapline_test_utils::{Observed, TestHarness};

fn is_connected(payload: &EventPayload) -> bool {
    matches!(payload, EventPayload::InstanceConnected { .. })
}

fn is_reconnect(payload: &EventPayload) -> bool {
    matches!(payload, EventPayload::InstanceReconnect { .. })
}

#[tokio::test(start_paused = true)]
async fn transient_closures_back_off_exponentially() {
    let mut h = TestHarness::new().unwrap();
    let instance = h.create("tenant-a", "support line").await;
    h.manager.start_instance(&instance.id).await.unwrap();

    let first = h.connector.wait_for_session(0).await;
    first.open("15550001@s.whatsapp.net").await;
    h.wait_for_event(is_connected).await;

    let closed_at = Instant::now();
    first.close_with(Some(428), "connection lost").await;

    let disconnected = h
        .wait_for_event(|p| matches!(p, EventPayload::InstanceDisconnected { .. }))
        .await;
    match disconnected.payload {
        EventPayload::InstanceDisconnected {
            reason,
            will_reconnect,
        } => {
            assert!(reason.is_transient());
            assert!(will_reconnect);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    let scheduled = h.wait_for_event(is_reconnect).await;
    assert!(matches!(
        scheduled.payload,
        EventPayload::InstanceReconnect {
            attempt: 1,
            delay_ms: 2000
        }
    ));

    let second = h.connector.wait_for_session(1).await;
    let waited = closed_at.elapsed();
    assert!(waited >= Duration::from_millis(2000), "reconnected after {waited:?}");
    assert!(waited < Duration::from_millis(2100), "reconnected after {waited:?}");

    // Never opened, so the attempt counter keeps climbing.
    let closed_again = Instant::now();
    second.close_with(Some(428), "connection lost").await;
    let scheduled = h.wait_for_event(is_reconnect).await;
    assert!(matches!(
        scheduled.payload,
        EventPayload::InstanceReconnect {
            attempt: 2,
            delay_ms: 4000
        }
    ));

    h.connector.wait_for_session(2).await;
    let waited = closed_again.elapsed();
    assert!(waited >= Duration::from_millis(4000), "reconnected after {waited:?}");
    assert!(waited < Duration::from_millis(4100), "reconnected after {waited:?}");
    assert_eq!(h.manager.reconnect_attempts(&instance.id), 2);
}

#[tokio::test(start_paused = true)]
async fn successful_connect_resets_attempts() {
    let mut h = TestHarness::new().unwrap();
    let instance = h.create("tenant-a", "support line").await;
    h.manager.start_instance(&instance.id).await.unwrap();

    let first = h.connector.wait_for_session(0).await;
    first.open("15550001@s.whatsapp.net").await;
    h.wait_for_event(is_connected).await;
    first.close_with(None, "stream errored").await;
    h.wait_for_event(is_reconnect).await;

    let second = h.connector.wait_for_session(1).await;
    second.open("15550001@s.whatsapp.net").await;
    h.wait_for_event(is_connected).await;
    assert_eq!(h.manager.reconnect_attempts(&instance.id), 0);

    second.close_with(None, "stream errored").await;
    let scheduled = h.wait_for_event(is_reconnect).await;
    assert!(matches!(
        scheduled.payload,
        EventPayload::InstanceReconnect {
            attempt: 1,
            delay_ms: 2000
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn logged_out_closure_is_terminal() {
    let mut h = TestHarness::new().unwrap();
    let instance = h.create("tenant-a", "support line").await;
    h.manager.start_instance(&instance.id).await.unwrap();

    let session = h.connector.wait_for_session(0).await;
    session.rotate_credentials(b"paired-device").await;
    session.open("15550001@s.whatsapp.net").await;
    h.wait_for_event(is_connected).await;
    assert!(h.store.get(&instance.id).await.is_some());

    session.close_with(Some(401), "logged out").await;
    let event = h
        .wait_for_event(|p| matches!(p, EventPayload::InstanceDisconnected { .. }))
        .await;
    match event.payload {
        EventPayload::InstanceDisconnected {
            reason,
            will_reconnect,
        } => {
            assert!(matches!(reason, DisconnectReason::Terminal { code: Some(401), .. }));
            assert!(!will_reconnect);
        }
        other => panic!("unexpected payload {other:?}"),
    }

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.connector.session_count(), 1);
    assert!(h.store.get(&instance.id).await.is_none());
    assert_eq!(
        h.manager.get_instance(&instance.id).await.unwrap().status,
        ConnectionStatus::Disconnected
    );
    assert!(h.observer.reconnect_attempts().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_reconnect() {
    let mut h = TestHarness::new().unwrap();
    let instance = h.create("tenant-a", "support line").await;
    h.manager.start_instance(&instance.id).await.unwrap();

    let session = h.connector.wait_for_session(0).await;
    session.open("15550001@s.whatsapp.net").await;
    h.wait_for_event(is_connected).await;
    session.close_with(Some(428), "connection lost").await;
    h.wait_for_event(is_reconnect).await;

    h.manager.stop_instance(&instance.id).await.unwrap();
    h.wait_for_event(|p| matches!(p, EventPayload::InstanceStopped))
        .await;

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.connector.connect_count().await, 1);
    assert_eq!(h.manager.reconnect_attempts(&instance.id), 0);
    assert_eq!(
        h.manager.get_instance(&instance.id).await.unwrap().status,
        ConnectionStatus::Disconnected
    );
    assert!(
        h.drain_events()
            .iter()
            .all(|e| !matches!(e.payload, EventPayload::InstanceReconnect { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_count_towards_the_budget() {
    let mut h = TestHarness::builder().with_max_attempts(3).build().unwrap();
    let instance = h.create("tenant-a", "support line").await;
    h.manager.start_instance(&instance.id).await.unwrap();

    let session = h.connector.wait_for_session(0).await;
    session.open("15550001@s.whatsapp.net").await;
    h.wait_for_event(is_connected).await;

    for _ in 0..3 {
        h.connector
            .fail_next_connect(VendorError::new("network unreachable"))
            .await;
    }
    session.close_with(Some(408), "timed out").await;

    let exhausted = h
        .wait_for_event(|p| {
            matches!(
                p,
                EventPayload::InstanceDisconnected {
                    will_reconnect: false,
                    ..
                }
            )
        })
        .await;
    assert_eq!(exhausted.instance_id, instance.id);

    assert_eq!(
        h.observer
            .reconnect_attempts()
            .await
            .iter()
            .map(|(attempt, _)| *attempt)
            .collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    let seen = h.observer.seen().await;
    assert!(
        matches!(
            seen.last(),
            Some(Observed::Disconnected(
                id,
                DisconnectReason::Transient { code: None, .. }
            )) if *id == instance.id
        ),
        "observers missed the final disconnect: {seen:?}"
    );
    assert_eq!(h.connector.connect_count().await, 4);
    assert_eq!(
        h.manager.get_instance(&instance.id).await.unwrap().status,
        ConnectionStatus::Disconnected
    );

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.connector.connect_count().await, 4);

    // An explicit start works again after exhaustion.
    h.manager.start_instance(&instance.id).await.unwrap();
    assert_eq!(h.connector.session_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn closures_after_exhaustion_are_not_retried() {
    let mut h = TestHarness::builder().with_max_attempts(1).build().unwrap();
    let instance = h.create("tenant-a", "support line").await;
    h.manager.start_instance(&instance.id).await.unwrap();

    let first = h.connector.wait_for_session(0).await;
    first.close_with(Some(428), "connection lost").await;
    h.wait_for_event(is_reconnect).await;

    let second = h.connector.wait_for_session(1).await;
    second.close_with(Some(428), "connection lost").await;
    let event = h
        .wait_for_event(|p| matches!(p, EventPayload::InstanceDisconnected { .. }))
        .await;
    assert!(matches!(
        event.payload,
        EventPayload::InstanceDisconnected {
            will_reconnect: false,
            ..
        }
    ));

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.connector.session_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn observers_see_lifecycle_in_order() {
    let mut h = TestHarness::new().unwrap();
    let instance = h.create("tenant-a", "support line").await;
    h.manager.start_instance(&instance.id).await.unwrap();

    let session = h.connector.wait_for_session(0).await;
    session.open("15550001@s.whatsapp.net").await;
    h.wait_for_event(is_connected).await;
    session.close_with(Some(500), "internal error").await;
    h.wait_for_event(is_reconnect).await;

    let seen = h.observer.seen().await;
    assert_eq!(seen.len(), 3, "{seen:?}");
    assert_eq!(seen[0], Observed::Connected(instance.id.clone()));
    assert!(matches!(
        &seen[1],
        Observed::Disconnected(id, DisconnectReason::Transient { code: Some(500), .. }) if *id == instance.id
    ));
    assert_eq!(
        seen[2],
        Observed::ReconnectAttempt(instance.id.clone(), 1, Duration::from_millis(2000))
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_every_pending_reconnect() {
    let mut h = TestHarness::new().unwrap();
    let a = h.create("tenant-a", "line a").await;
    let b = h.create("tenant-b", "line b").await;
    h.manager.start_instance(&a.id).await.unwrap();
    h.manager.start_instance(&b.id).await.unwrap();

    let first = h.connector.wait_for_session(0).await;
    first.close_with(Some(428), "connection lost").await;
    h.wait_for_event(is_reconnect).await;

    h.manager.shutdown().await;
    assert!(h.manager.is_shutting_down());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.connector.session_count(), 2);
    for instance in h.manager.get_all_instances().await {
        assert_eq!(instance.status, ConnectionStatus::Disconnected);
    }
}

#[tokio::test(start_paused = true)]
async fn delete_during_inflight_reconnect_closes_new_session() {
    let mut h = TestHarness::new().unwrap();
    let instance = h.create("tenant-a", "support line").await;
    h.store
        .insert(
            &instance.id,
            zapline_core::SessionCredentials::new(b"paired".to_vec()),
        )
        .await;
    h.store.delay_loads(Duration::from_millis(500));
    h.manager.start_instance(&instance.id).await.unwrap();

    let first = h.connector.wait_for_session(0).await;
    first.open("15550001@s.whatsapp.net").await;
    h.wait_for_event(is_connected).await;

    first.close_with(Some(428), "connection lost").await;
    h.wait_for_event(is_reconnect).await;

    // The reconnect fires at 2000ms and is still loading credentials.
    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert_eq!(h.connector.session_count(), 1);
    h.manager.delete_instance(&instance.id).await.unwrap();

    let second = h.connector.session(1).await.expect("reconnect finished first");
    assert!(second.session.is_closed());
    assert!(h.manager.get_instance(&instance.id).await.is_err());
    assert!(h.manager.get_all_instances().await.is_empty());
    assert!(h.store.get(&instance.id).await.is_none());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.connector.connect_count().await, 2);
    assert_eq!(h.connector.session_count(), 2);
}
