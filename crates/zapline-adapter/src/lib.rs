// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol adapter for Zapline instances.
//!
//! A [`ProtocolAdapter`] owns at most one vendor session at a time. It
//! consumes the vendor event stream on a dedicated pump task, keeps the
//! instance's [`ConnectionStatus`], persists rotated credentials, normalizes
//! inbound messages, and reports everything as [`AdapterSignal`]s over an
//! unbounded channel. It never reconnects on its own.

pub mod closure;
pub mod events;
pub mod media;
pub mod normalize;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use zapline_core::vendor::{
    ConnectionState, ConnectionUpdate, DisconnectInfo, OutboundMedia, VendorEvent, VendorMessage,
};
use zapline_core::{
    ConnectionStatus, InstanceId, MediaStorage, MessageType, SendReceipt, SessionCredentials,
    SessionStore, VendorConnector, VendorSession, ZaplineError,
};

pub use events::{AdapterEvent, AdapterSignal};
pub use media::LocalMediaStorage;

use crate::normalize::{Extracted, Skip};

/// Collaborators shared by every adapter of a manager.
#[derive(Clone)]
pub struct AdapterDeps {
    pub connector: Arc<dyn VendorConnector>,
    pub session_store: Arc<dyn SessionStore>,
    /// Inbound media is delivered without attachment when absent.
    pub media_storage: Option<Arc<dyn MediaStorage>>,
}

/// Adapter between one instance and the vendor protocol library.
pub struct ProtocolAdapter {
    shared: Arc<Shared>,
}

struct Shared {
    instance_id: InstanceId,
    deps: AdapterDeps,
    status: watch::Sender<ConnectionStatus>,
    events: mpsc::UnboundedSender<AdapterSignal>,
    /// Bumped whenever a session starts or is torn down on request.
    generation: AtomicU64,
    live: Mutex<Option<LiveSession>>,
}

struct LiveSession {
    session: Arc<dyn VendorSession>,
    generation: u64,
    own_jid: Option<String>,
    pump: JoinHandle<()>,
}

impl ProtocolAdapter {
    /// Creates a disconnected adapter. Nothing is contacted until [`initialize`](Self::initialize).
    pub fn new(
        instance_id: InstanceId,
        deps: AdapterDeps,
        events: mpsc::UnboundedSender<AdapterSignal>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            shared: Arc::new(Shared {
                instance_id,
                deps,
                status,
                events,
                generation: AtomicU64::new(0),
                live: Mutex::new(None),
            }),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.shared.instance_id
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    /// Receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Generation of the current (or most recent) session.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Account id reported by the vendor once the session opened.
    pub async fn own_jid(&self) -> Option<String> {
        self.shared
            .live
            .lock()
            .await
            .as_ref()
            .and_then(|live| live.own_jid.clone())
    }

    /// Establish or resume the vendor session.
    ///
    /// A no-op while a session is already live. Failures set the status to
    /// `error` and are returned as [`ZaplineError::Initialization`].
    pub async fn initialize(&self) -> Result<(), ZaplineError> {
        let shared = &self.shared;
        let mut live = shared.live.lock().await;
        if live.is_some() {
            debug!(instance_id = %shared.instance_id, "session already live, initialize is a no-op");
            return Ok(());
        }

        let credentials = match shared.deps.session_store.load(&shared.instance_id).await {
            Ok(credentials) => credentials,
            Err(e) => {
                shared.set_status(ConnectionStatus::Error);
                return Err(ZaplineError::Initialization {
                    instance_id: shared.instance_id.clone(),
                    message: format!("failed to load session credentials: {e}"),
                    source: Some(Box::new(e)),
                });
            }
        };
        let resuming = credentials.is_some();

        shared.set_status(ConnectionStatus::Connecting);
        let connection = match shared
            .deps
            .connector
            .connect(&shared.instance_id, credentials)
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                shared.set_status(ConnectionStatus::Error);
                return Err(ZaplineError::Initialization {
                    instance_id: shared.instance_id.clone(),
                    message: format!("vendor session could not be established: {e}"),
                    source: Some(Box::new(e)),
                });
            }
        };

        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let pump = tokio::spawn(run_pump(
            Arc::clone(shared),
            generation,
            Arc::clone(&connection.session),
            connection.events,
        ));
        *live = Some(LiveSession {
            session: connection.session,
            generation,
            own_jid: None,
            pump,
        });

        info!(
            instance_id = %shared.instance_id,
            generation,
            resuming,
            store = shared.deps.session_store.name(),
            "vendor session started"
        );
        Ok(())
    }

    /// Stop the event pump and close the vendor session.
    ///
    /// Emits no closure event. Signals still in flight from the closed session
    /// carry a stale generation afterwards.
    pub async fn disconnect(&self) -> Result<(), ZaplineError> {
        let shared = &self.shared;
        let mut live = shared.live.lock().await;
        shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = live.take() {
            session.pump.abort();
            session.session.close().await;
            info!(instance_id = %shared.instance_id, generation = session.generation, "vendor session closed");
        }
        shared.set_status(ConnectionStatus::Disconnected);
        Ok(())
    }

    /// Revoke the device pairing, close the session and forget the credentials.
    ///
    /// Requires a live session. The vendor error is returned unchanged and
    /// leaves the session running.
    pub async fn logout(&self) -> Result<(), ZaplineError> {
        let shared = &self.shared;
        let mut live = shared.live.lock().await;
        let Some(current) = live.as_ref() else {
            return Err(ZaplineError::NotConnected {
                instance_id: shared.instance_id.clone(),
                status: self.status(),
            });
        };
        current.session.logout().await?;

        shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = live.take() {
            session.pump.abort();
            session.session.close().await;
        }
        shared.set_status(ConnectionStatus::Disconnected);
        shared.deps.session_store.delete(&shared.instance_id).await?;
        info!(instance_id = %shared.instance_id, "logged out, credentials removed");
        Ok(())
    }

    pub async fn send_text(&self, to: &str, content: &str) -> Result<SendReceipt, ZaplineError> {
        let session = self.connected_session().await?;
        let external_id = session.send_text(to, content).await?;
        debug!(instance_id = %self.shared.instance_id, to, external_id = %external_id, "text sent");
        Ok(SendReceipt::sent(external_id))
    }

    /// Send media the vendor fetches from `media_url`.
    pub async fn send_media(
        &self,
        to: &str,
        media_url: &str,
        caption: Option<&str>,
        media_type: MessageType,
    ) -> Result<SendReceipt, ZaplineError> {
        let session = self.connected_session().await?;
        let media = OutboundMedia {
            url: media_url.to_string(),
            caption: caption.map(str::to_string),
            media_type,
        };
        let external_id = session.send_media(to, &media).await?;
        debug!(
            instance_id = %self.shared.instance_id,
            to,
            media_type = %media_type,
            external_id = %external_id,
            "media sent"
        );
        Ok(SendReceipt::sent(external_id))
    }

    pub async fn mark_read(&self, chat: &str, message_ids: &[String]) -> Result<(), ZaplineError> {
        let session = self.connected_session().await?;
        session.mark_read(chat, message_ids).await?;
        Ok(())
    }

    pub async fn profile_picture_url(&self, jid: &str) -> Result<Option<String>, ZaplineError> {
        let session = self.connected_session().await?;
        Ok(session.profile_picture_url(jid).await?)
    }

    async fn connected_session(&self) -> Result<Arc<dyn VendorSession>, ZaplineError> {
        let not_connected = |status| ZaplineError::NotConnected {
            instance_id: self.shared.instance_id.clone(),
            status,
        };
        let status = self.status();
        if status != ConnectionStatus::Connected {
            return Err(not_connected(status));
        }
        self.shared
            .live
            .lock()
            .await
            .as_ref()
            .map(|live| Arc::clone(&live.session))
            .ok_or_else(|| not_connected(self.status()))
    }
}

impl Drop for ProtocolAdapter {
    fn drop(&mut self) {
        if let Ok(mut live) = self.shared.live.try_lock()
            && let Some(session) = live.take()
        {
            session.pump.abort();
        }
    }
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!(instance_id = %self.instance_id, from = %previous, to = %status, "status changed");
        }
    }

    fn emit(&self, generation: u64, event: AdapterEvent) {
        // The receiver is gone only when the owning manager was dropped.
        let _ = self.events.send(AdapterSignal { generation, event });
    }

    fn is_current(live: Option<&LiveSession>, generation: u64) -> bool {
        live.is_some_and(|l| l.generation == generation)
    }

    /// Returns `false` once the session is over and the pump must stop.
    async fn on_connection_update(
        &self,
        generation: u64,
        update: ConnectionUpdate,
        own_jid: &mut Option<String>,
    ) -> bool {
        if update.connection == Some(ConnectionState::Close) {
            self.on_closed(generation, update.last_disconnect).await;
            return false;
        }

        let mut live = self.live.lock().await;
        if !Self::is_current(live.as_ref(), generation) {
            return false;
        }

        if let Some(qr) = update.qr {
            self.set_status(ConnectionStatus::QrRequired);
            info!(instance_id = %self.instance_id, "pairing required, QR challenge issued");
            self.emit(generation, AdapterEvent::QrCode { qr });
        }

        match update.connection {
            Some(ConnectionState::Connecting) => self.set_status(ConnectionStatus::Connecting),
            Some(ConnectionState::Open) => {
                if let Some(jid) = update.own_jid {
                    *own_jid = Some(jid);
                }
                if let Some(current) = live.as_mut() {
                    current.own_jid = own_jid.clone();
                }
                self.set_status(ConnectionStatus::Connected);
                info!(instance_id = %self.instance_id, own_jid = ?own_jid, "instance connected");
                self.emit(
                    generation,
                    AdapterEvent::Connected {
                        own_jid: own_jid.clone(),
                    },
                );
            }
            Some(ConnectionState::Close) | None => {}
        }
        true
    }

    async fn on_closed(&self, generation: u64, info: Option<DisconnectInfo>) {
        let reason = closure::classify(info.as_ref());
        let mut live = self.live.lock().await;
        if !Self::is_current(live.as_ref(), generation) {
            debug!(instance_id = %self.instance_id, generation, "ignoring closure of a replaced session");
            return;
        }
        // Drops our own pump handle, which detaches the running task.
        live.take();
        self.set_status(ConnectionStatus::Disconnected);

        if closure::is_logged_out(&reason) {
            match self.deps.session_store.delete(&self.instance_id).await {
                Ok(()) => info!(instance_id = %self.instance_id, "session revoked, stored credentials removed"),
                Err(e) => warn!(
                    instance_id = %self.instance_id,
                    error = %e,
                    "failed to remove credentials of revoked session"
                ),
            }
        }

        let should_reconnect = reason.is_transient();
        if should_reconnect {
            info!(instance_id = %self.instance_id, reason = %reason, "connection lost");
        } else {
            warn!(instance_id = %self.instance_id, reason = %reason, "connection closed permanently");
        }
        self.emit(
            generation,
            AdapterEvent::Closed {
                reason,
                should_reconnect,
            },
        );
    }

    async fn persist_credentials(&self, credentials: &SessionCredentials) {
        if let Err(e) = self
            .deps
            .session_store
            .save(&self.instance_id, credentials)
            .await
        {
            warn!(
                instance_id = %self.instance_id,
                store = self.deps.session_store.name(),
                error = %e,
                "failed to persist rotated credentials"
            );
        }
    }

    async fn on_inbound(
        &self,
        generation: u64,
        session: &dyn VendorSession,
        message: &VendorMessage,
        own_jid: Option<&str>,
    ) {
        let extracted = match normalize::extract(message) {
            Ok(extracted) => extracted,
            Err(Skip::Unsupported) => {
                debug!(
                    instance_id = %self.instance_id,
                    message_id = %message.key.id,
                    "skipping unsupported message kind"
                );
                return;
            }
            Err(_) => return,
        };

        let media = match &extracted {
            Extracted::Media {
                message_type,
                payload,
            } => {
                media::fetch_media(
                    &self.instance_id,
                    session,
                    self.deps.media_storage.as_ref(),
                    message,
                    *message_type,
                    payload,
                )
                .await
            }
            Extracted::Text(_) => None,
        };

        let to = own_jid.unwrap_or(self.instance_id.as_str());
        let normalized = normalize::normalize(message, &extracted, to, media);
        self.emit(generation, AdapterEvent::Message(normalized));
    }
}

/// Serially consume the vendor event stream of one session.
async fn run_pump(
    shared: Arc<Shared>,
    generation: u64,
    session: Arc<dyn VendorSession>,
    mut events: mpsc::Receiver<VendorEvent>,
) {
    let mut own_jid = None;
    while let Some(event) = events.recv().await {
        match event {
            VendorEvent::ConnectionUpdate(update) => {
                if !shared
                    .on_connection_update(generation, update, &mut own_jid)
                    .await
                {
                    return;
                }
            }
            VendorEvent::CredentialsUpdate(credentials) => {
                shared.persist_credentials(&credentials).await;
            }
            VendorEvent::Messages(batch) => {
                for message in &batch {
                    shared
                        .on_inbound(generation, session.as_ref(), message, own_jid.as_deref())
                        .await;
                }
            }
            VendorEvent::MessageStatus(updates) => {
                for update in updates {
                    shared.emit(generation, AdapterEvent::MessageStatus(update));
                }
            }
            VendorEvent::Presence(presence) => {
                shared.emit(generation, AdapterEvent::Presence(presence));
            }
        }
    }

    shared
        .on_closed(
            generation,
            Some(DisconnectInfo {
                status_code: None,
                message: "event stream ended".to_string(),
            }),
        )
        .await;
}
