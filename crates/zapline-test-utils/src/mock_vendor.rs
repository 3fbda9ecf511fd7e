// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted stand-in for the vendor protocol library.
//!
//! [`MockConnector`] hands out one [`MockSession`] per successful connect and
//! keeps a [`MockSessionHandle`] for each, through which tests push vendor
//! events into the adapter exactly as the real library would.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};

use zapline_core::vendor::{
    ConnectionState, ConnectionUpdate, MessageStatusUpdate, OutboundMedia, VendorError,
    VendorEvent, VendorMessage,
};
use zapline_core::{
    InstanceId, SessionCredentials, VendorConnection, VendorConnector, VendorSession,
};

/// Capacity of each mock event stream.
const EVENT_BUFFER: usize = 64;

/// A connect call as the connector saw it.
#[derive(Debug, Clone)]
pub struct ConnectCall {
    pub instance_id: InstanceId,
    pub credentials: Option<SessionCredentials>,
}

/// Vendor connector that records calls and can be told to fail.
pub struct MockConnector {
    failures: Mutex<VecDeque<VendorError>>,
    calls: Mutex<Vec<ConnectCall>>,
    sessions: Mutex<Vec<MockSessionHandle>>,
    established: watch::Sender<usize>,
}

impl MockConnector {
    pub fn new() -> Self {
        let (established, _) = watch::channel(0);
        Self {
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            established,
        }
    }

    /// Make the next connect call fail with `error`. Queued failures are consumed in order.
    pub async fn fail_next_connect(&self, error: VendorError) {
        self.failures.lock().await.push_back(error);
    }

    /// Every connect call so far, failed ones included.
    pub async fn calls(&self) -> Vec<ConnectCall> {
        self.calls.lock().await.clone()
    }

    pub async fn connect_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Number of sessions successfully established.
    pub fn session_count(&self) -> usize {
        *self.established.borrow()
    }

    /// The `index`-th established session (0-based), if it exists yet.
    pub async fn session(&self, index: usize) -> Option<MockSessionHandle> {
        self.sessions.lock().await.get(index).cloned()
    }

    pub async fn latest_session(&self) -> Option<MockSessionHandle> {
        self.sessions.lock().await.last().cloned()
    }

    /// Wait until the `index`-th session is established and return it.
    pub async fn wait_for_session(&self, index: usize) -> MockSessionHandle {
        let mut established = self.established.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = established.wait_for(|count| *count > index).await;
        self.sessions.lock().await[index].clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VendorConnector for MockConnector {
    async fn connect(
        &self,
        instance_id: &InstanceId,
        credentials: Option<SessionCredentials>,
    ) -> Result<VendorConnection, VendorError> {
        self.calls.lock().await.push(ConnectCall {
            instance_id: instance_id.clone(),
            credentials,
        });
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let session = Arc::new(MockSession::new(instance_id.clone()));
        let handle = MockSessionHandle {
            session: Arc::clone(&session),
            events: Arc::new(Mutex::new(Some(tx))),
        };
        let mut sessions = self.sessions.lock().await;
        sessions.push(handle);
        self.established.send_replace(sessions.len());

        Ok(VendorConnection {
            session,
            events: rx,
        })
    }
}

/// Test-side end of one mock session.
#[derive(Clone)]
pub struct MockSessionHandle {
    pub session: Arc<MockSession>,
    events: Arc<Mutex<Option<mpsc::Sender<VendorEvent>>>>,
}

impl MockSessionHandle {
    /// Push a raw vendor event. Silently dropped once the adapter stopped listening.
    pub async fn emit(&self, event: VendorEvent) {
        let sender = self.events.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub async fn qr(&self, challenge: &str) {
        self.emit(VendorEvent::ConnectionUpdate(ConnectionUpdate::qr(challenge)))
            .await;
    }

    pub async fn connecting(&self) {
        self.emit(VendorEvent::ConnectionUpdate(ConnectionUpdate::state(
            ConnectionState::Connecting,
        )))
        .await;
    }

    pub async fn open(&self, own_jid: &str) {
        self.emit(VendorEvent::ConnectionUpdate(ConnectionUpdate::open(own_jid)))
            .await;
    }

    pub async fn close_with(&self, status_code: Option<u16>, message: &str) {
        self.emit(VendorEvent::ConnectionUpdate(ConnectionUpdate::closed(
            status_code,
            message,
        )))
        .await;
    }

    pub async fn rotate_credentials(&self, bytes: &[u8]) {
        self.emit(VendorEvent::CredentialsUpdate(SessionCredentials::new(
            bytes.to_vec(),
        )))
        .await;
    }

    pub async fn messages(&self, batch: Vec<VendorMessage>) {
        self.emit(VendorEvent::Messages(batch)).await;
    }

    pub async fn statuses(&self, updates: Vec<MessageStatusUpdate>) {
        self.emit(VendorEvent::MessageStatus(updates)).await;
    }

    /// Close the event stream without a close update.
    pub async fn end_stream(&self) {
        self.events.lock().await.take();
    }
}

/// A sent text as recorded by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub to: String,
    pub text: String,
}

/// A sent media message as recorded by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMedia {
    pub to: String,
    pub media: OutboundMedia,
}

/// Vendor session that records every primitive call.
pub struct MockSession {
    instance_id: InstanceId,
    next_id: AtomicUsize,
    texts: Mutex<Vec<SentText>>,
    media: Mutex<Vec<SentMedia>>,
    reads: Mutex<Vec<(String, Vec<String>)>>,
    send_failure: Mutex<Option<VendorError>>,
    download: Mutex<Result<Vec<u8>, VendorError>>,
    profile_picture: Mutex<Option<String>>,
    logout_failure: Mutex<Option<VendorError>>,
    closed: AtomicBool,
    hang_on_close: AtomicBool,
    logged_out: AtomicBool,
}

impl MockSession {
    fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            next_id: AtomicUsize::new(1),
            texts: Mutex::new(Vec::new()),
            media: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            send_failure: Mutex::new(None),
            download: Mutex::new(Ok(b"mock-media-bytes".to_vec())),
            profile_picture: Mutex::new(None),
            logout_failure: Mutex::new(None),
            closed: AtomicBool::new(false),
            hang_on_close: AtomicBool::new(false),
            logged_out: AtomicBool::new(false),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Make every subsequent send fail with `error`.
    pub async fn fail_sends(&self, error: VendorError) {
        *self.send_failure.lock().await = Some(error);
    }

    pub async fn fail_downloads(&self, error: VendorError) {
        *self.download.lock().await = Err(error);
    }

    pub async fn fail_logout(&self, error: VendorError) {
        *self.logout_failure.lock().await = Some(error);
    }

    pub async fn set_profile_picture(&self, url: &str) {
        *self.profile_picture.lock().await = Some(url.to_string());
    }

    pub async fn sent_texts(&self) -> Vec<SentText> {
        self.texts.lock().await.clone()
    }

    pub async fn sent_media(&self) -> Vec<SentMedia> {
        self.media.lock().await.clone()
    }

    pub async fn read_marks(&self) -> Vec<(String, Vec<String>)> {
        self.reads.lock().await.clone()
    }

    /// Make `close` mark the session closed and then never return.
    pub fn hang_on_close(&self, hang: bool) {
        self.hang_on_close.store(hang, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    async fn check_send(&self) -> Result<String, VendorError> {
        if let Some(error) = self.send_failure.lock().await.clone() {
            return Err(error);
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock-msg-{n}"))
    }
}

#[async_trait]
impl VendorSession for MockSession {
    async fn send_text(&self, to: &str, text: &str) -> Result<String, VendorError> {
        let id = self.check_send().await?;
        self.texts.lock().await.push(SentText {
            to: to.to_string(),
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn send_media(&self, to: &str, media: &OutboundMedia) -> Result<String, VendorError> {
        let id = self.check_send().await?;
        self.media.lock().await.push(SentMedia {
            to: to.to_string(),
            media: media.clone(),
        });
        Ok(id)
    }

    async fn download_media(&self, _message: &VendorMessage) -> Result<Vec<u8>, VendorError> {
        self.download.lock().await.clone()
    }

    async fn mark_read(&self, chat: &str, message_ids: &[String]) -> Result<(), VendorError> {
        self.reads
            .lock()
            .await
            .push((chat.to_string(), message_ids.to_vec()));
        Ok(())
    }

    async fn profile_picture_url(&self, _jid: &str) -> Result<Option<String>, VendorError> {
        Ok(self.profile_picture.lock().await.clone())
    }

    async fn logout(&self) -> Result<(), VendorError> {
        if let Some(error) = self.logout_failure.lock().await.clone() {
            return Err(error);
        }
        self.logged_out.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.hang_on_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}
