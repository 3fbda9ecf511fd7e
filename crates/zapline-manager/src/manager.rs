// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance registry and lifecycle manager.
//!
//! Every instance owns one [`ProtocolAdapter`] and one listener task that
//! consumes the adapter's signals in order. `initialize()` and
//! `disconnect()` of an instance are serialized by its lifecycle lock; the
//! reconnect timer re-checks its cancellation under the same lock, so a
//! stop can never be followed by a late reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use zapline_adapter::{AdapterDeps, AdapterEvent, AdapterSignal, LocalMediaStorage, ProtocolAdapter};
use zapline_config::{Environment, ZaplineConfig};
use zapline_core::types::{HealthReport, InstanceSummary};
use zapline_core::{
    ConnectionStatus, DisconnectReason, Instance, InstanceId, InstanceRef, MediaStorage,
    MessageType, SendReceipt, SessionStore, TenantId, VendorConnector, ZaplineError,
};
use zapline_session::FilesystemSessionStore;

use crate::events::{EventBus, EventPayload, ZaplineEvent};
use crate::observers::ObserverRegistry;
use crate::reconnect::{ReconnectPlan, ReconnectPolicy, ReconnectSupervisor};

/// External collaborators of the manager.
#[derive(Clone)]
pub struct ManagerDeps {
    pub connector: Arc<dyn VendorConnector>,
    /// Pluggable credential store. Mandatory outside development.
    pub session_store: Option<Arc<dyn SessionStore>>,
    pub media_storage: Option<Arc<dyn MediaStorage>>,
}

/// Registry of all instances and owner of their lifecycle.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct InstanceManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    adapter_deps: AdapterDeps,
    instances: RwLock<HashMap<InstanceId, Arc<InstanceEntry>>>,
    supervisor: ReconnectSupervisor,
    observers: ObserverRegistry,
    events: EventBus,
    shutting_down: AtomicBool,
}

struct InstanceEntry {
    instance: InstanceRef,
    display_name: String,
    webhook_url: Option<String>,
    created_at: DateTime<Utc>,
    last_activity_ms: AtomicI64,
    adapter: ProtocolAdapter,
    /// Serializes initialize/disconnect and reconnect timer firing.
    lifecycle: Mutex<()>,
    manual_stop: AtomicBool,
    /// Set once deletion starts; the entry never connects again.
    retired: AtomicBool,
    listener: OnceLock<AbortHandle>,
}

impl InstanceEntry {
    fn id(&self) -> &InstanceId {
        &self.instance.instance_id
    }

    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity_ms.load(Ordering::SeqCst))
            .unwrap_or(self.created_at)
    }

    fn snapshot(&self) -> Instance {
        Instance {
            id: self.instance.instance_id.clone(),
            tenant_id: self.instance.tenant_id.clone(),
            display_name: self.display_name.clone(),
            webhook_url: self.webhook_url.clone(),
            status: self.adapter.status(),
            created_at: self.created_at,
            last_activity_at: self.last_activity(),
        }
    }
}

impl InstanceManager {
    /// Build a manager from configuration and collaborators.
    ///
    /// Without a pluggable session store, only the development environment
    /// may start; it falls back to a filesystem store.
    pub fn new(config: &ZaplineConfig, deps: ManagerDeps) -> Result<Self, ZaplineError> {
        let environment = config.manager.environment;
        let session_store = match deps.session_store {
            Some(store) => store,
            None if environment == Environment::Development => {
                warn!(
                    directory = %config.session.directory,
                    "no session store configured, using the filesystem store (development only)"
                );
                Arc::new(FilesystemSessionStore::new(&config.session.directory))
            }
            None => {
                return Err(ZaplineError::Config(format!(
                    "a pluggable session store is required in the {environment} environment \
                     (set session.backend = \"sqlite\")"
                )));
            }
        };

        info!(
            environment = %environment,
            store = session_store.name(),
            media = deps.media_storage.is_some(),
            "instance manager ready"
        );
        Ok(Self {
            inner: Arc::new(ManagerInner {
                adapter_deps: AdapterDeps {
                    connector: deps.connector,
                    session_store,
                    media_storage: deps.media_storage,
                },
                instances: RwLock::new(HashMap::new()),
                supervisor: ReconnectSupervisor::new(ReconnectPolicy::from(&config.reconnect)),
                observers: ObserverRegistry::new(),
                events: EventBus::new(config.manager.event_capacity),
                shutting_down: AtomicBool::new(false),
            }),
        })
    }

    /// Build a manager whose session and media storage come from configuration.
    pub async fn from_config(
        config: &ZaplineConfig,
        connector: Arc<dyn VendorConnector>,
    ) -> Result<Self, ZaplineError> {
        let session_store = zapline_session::session_store_from_config(&config.session).await?;
        let media_storage = LocalMediaStorage::from_config(&config.media)
            .map(|storage| Arc::new(storage) as Arc<dyn MediaStorage>);
        Self::new(
            config,
            ManagerDeps {
                connector,
                session_store,
                media_storage,
            },
        )
    }

    /// Register a new instance without starting it.
    pub async fn create_instance(
        &self,
        tenant_id: TenantId,
        display_name: impl Into<String>,
        webhook_url: Option<String>,
    ) -> Result<Instance, ZaplineError> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(ZaplineError::Internal(
                "instance manager is shutting down".to_string(),
            ));
        }

        let instance_id = InstanceId(uuid::Uuid::new_v4().to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        let adapter = ProtocolAdapter::new(instance_id.clone(), self.inner.adapter_deps.clone(), tx);
        let now = Utc::now();
        let entry = Arc::new(InstanceEntry {
            instance: InstanceRef {
                instance_id: instance_id.clone(),
                tenant_id,
            },
            display_name: display_name.into(),
            webhook_url,
            created_at: now,
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
            adapter,
            lifecycle: Mutex::new(()),
            manual_stop: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            listener: OnceLock::new(),
        });

        let listener = tokio::spawn(run_listener(
            Arc::downgrade(&self.inner),
            Arc::downgrade(&entry),
            rx,
        ));
        let _ = entry.listener.set(listener.abort_handle());

        self.inner
            .instances
            .write()
            .await
            .insert(instance_id.clone(), Arc::clone(&entry));

        info!(
            instance_id = %instance_id,
            tenant_id = %entry.instance.tenant_id,
            name = %entry.display_name,
            "instance created"
        );
        self.inner.publish(
            &entry,
            EventPayload::InstanceCreated {
                display_name: entry.display_name.clone(),
            },
        );
        Ok(entry.snapshot())
    }

    /// Start (or resume) the vendor session of an instance.
    ///
    /// Clears leftover reconnect state. Initialization failures propagate unchanged.
    pub async fn start_instance(&self, instance_id: &InstanceId) -> Result<(), ZaplineError> {
        let entry = self.inner.entry(instance_id).await?;
        let _lifecycle = entry.lifecycle.lock().await;
        if entry.retired.load(Ordering::SeqCst) {
            return Err(ZaplineError::InstanceNotFound {
                instance_id: instance_id.clone(),
            });
        }
        self.inner.supervisor.clear(instance_id);

        if let Err(e) = entry.adapter.initialize().await {
            warn!(
                instance_id = %instance_id,
                tenant_id = %entry.instance.tenant_id,
                error = %e,
                "instance failed to start"
            );
            return Err(e);
        }
        info!(instance_id = %instance_id, tenant_id = %entry.instance.tenant_id, "instance started");
        Ok(())
    }

    /// Close the vendor session and cancel any pending reconnect.
    pub async fn stop_instance(&self, instance_id: &InstanceId) -> Result<(), ZaplineError> {
        let entry = self.inner.entry(instance_id).await?;
        self.inner.stop_entry(&entry).await
    }

    /// Revoke the pairing on the vendor side and forget the stored credentials.
    pub async fn logout_instance(&self, instance_id: &InstanceId) -> Result<(), ZaplineError> {
        let entry = self.inner.entry(instance_id).await?;
        entry.manual_stop.store(true, Ordering::SeqCst);
        let result = {
            let _lifecycle = entry.lifecycle.lock().await;
            self.inner.supervisor.clear(instance_id);
            entry.adapter.logout().await
        };
        entry.manual_stop.store(false, Ordering::SeqCst);
        result?;

        info!(instance_id = %instance_id, tenant_id = %entry.instance.tenant_id, "instance logged out");
        self.inner
            .observers
            .notify_disconnected(&entry.instance, &DisconnectReason::ManualStop)
            .await;
        self.inner.publish(&entry, EventPayload::InstanceStopped);
        Ok(())
    }

    /// Stop if needed, remove persisted credentials and unregister the instance.
    ///
    /// Runs under the lifecycle lock, so a reconnect already in flight
    /// finishes first and its session is closed here. The instance is
    /// unregistered even when removing its credentials fails; that failure
    /// is returned afterwards.
    pub async fn delete_instance(&self, instance_id: &InstanceId) -> Result<(), ZaplineError> {
        let entry = self.inner.entry(instance_id).await?;
        entry.retired.store(true, Ordering::SeqCst);
        self.inner.supervisor.cancel(instance_id);

        let (was_live, credentials) = {
            let _lifecycle = entry.lifecycle.lock().await;
            self.inner.supervisor.clear(instance_id);
            let was_live = entry.adapter.status() != ConnectionStatus::Disconnected;
            if let Err(e) = entry.adapter.disconnect().await {
                warn!(instance_id = %instance_id, error = %e, "stop before delete failed");
            }
            let credentials = self
                .inner
                .adapter_deps
                .session_store
                .delete(instance_id)
                .await;
            self.inner.instances.write().await.remove(instance_id);
            (was_live, credentials)
        };

        if let Some(listener) = entry.listener.get() {
            listener.abort();
        }
        if was_live {
            self.inner
                .observers
                .notify_disconnected(&entry.instance, &DisconnectReason::ManualStop)
                .await;
            self.inner.publish(&entry, EventPayload::InstanceStopped);
        }
        info!(instance_id = %instance_id, tenant_id = %entry.instance.tenant_id, "instance deleted");
        self.inner.publish(&entry, EventPayload::InstanceDeleted);

        credentials.inspect_err(|e| {
            error!(instance_id = %instance_id, error = %e, "failed to remove stored credentials");
        })
    }

    /// Stop every instance concurrently. Individual failures are logged only.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.inner.supervisor.cancel_all();

        let entries: Vec<_> = self.inner.instances.read().await.values().cloned().collect();
        info!(instances = entries.len(), "shutting down instance manager");

        let results =
            futures::future::join_all(entries.iter().map(|entry| self.inner.stop_entry(entry)))
                .await;
        for (entry, result) in entries.iter().zip(results) {
            if let Err(e) = result {
                error!(
                    instance_id = %entry.id(),
                    tenant_id = %entry.instance.tenant_id,
                    error = %e,
                    "failed to stop instance during shutdown"
                );
            }
        }
        info!("instance manager shut down");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Aggregate status of all instances. Takes no lifecycle locks.
    ///
    /// Every instance that is not `connected` counts as disconnected,
    /// including `connecting`, `qr_required` and `error`.
    pub async fn health_check(&self) -> HealthReport {
        let instances = self.inner.instances.read().await;
        let mut summaries: Vec<InstanceSummary> = instances
            .values()
            .map(|entry| InstanceSummary {
                id: entry.id().clone(),
                tenant_id: entry.instance.tenant_id.clone(),
                name: entry.display_name.clone(),
                status: entry.adapter.status(),
                last_activity: Some(entry.last_activity()),
            })
            .collect();
        drop(instances);
        summaries.sort_by(|a, b| a.id.cmp(&b.id));

        let connected = summaries
            .iter()
            .filter(|s| s.status == ConnectionStatus::Connected)
            .count();
        HealthReport {
            total_instances: summaries.len(),
            connected_instances: connected,
            disconnected_instances: summaries.len() - connected,
            instances: summaries,
        }
    }

    /// Delete instances that are disconnected or errored and idle for at
    /// least `max_inactive_hours`. Returns the deleted ids.
    pub async fn cleanup_inactive_instances(&self, max_inactive_hours: u64) -> Vec<InstanceId> {
        let hours = i64::try_from(max_inactive_hours).unwrap_or(i64::MAX);
        let cutoff = chrono::Duration::try_hours(hours)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let candidates: Vec<InstanceId> = self
            .inner
            .instances
            .read()
            .await
            .values()
            .filter(|entry| {
                matches!(
                    entry.adapter.status(),
                    ConnectionStatus::Disconnected | ConnectionStatus::Error
                ) && entry.last_activity() <= cutoff
            })
            .map(|entry| entry.id().clone())
            .collect();

        let mut deleted = Vec::with_capacity(candidates.len());
        for instance_id in candidates {
            match self.delete_instance(&instance_id).await {
                Ok(()) => deleted.push(instance_id),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(instance_id = %instance_id, error = %e, "cleanup of inactive instance failed");
                    // Unregistered all the same.
                    deleted.push(instance_id);
                }
            }
        }
        if !deleted.is_empty() {
            info!(count = deleted.len(), max_inactive_hours, "inactive instances cleaned up");
        }
        deleted
    }

    pub async fn get_instance(&self, instance_id: &InstanceId) -> Result<Instance, ZaplineError> {
        Ok(self.inner.entry(instance_id).await?.snapshot())
    }

    /// All instances, oldest first.
    pub async fn get_all_instances(&self) -> Vec<Instance> {
        self.collect_instances(|_| true).await
    }

    /// Instances owned by `tenant_id`, oldest first.
    pub async fn get_tenant_instances(&self, tenant_id: &TenantId) -> Vec<Instance> {
        self.collect_instances(|entry| &entry.instance.tenant_id == tenant_id)
            .await
    }

    async fn collect_instances(&self, keep: impl Fn(&InstanceEntry) -> bool) -> Vec<Instance> {
        let mut instances: Vec<Instance> = self
            .inner
            .instances
            .read()
            .await
            .values()
            .filter(|entry| keep(entry))
            .map(|entry| entry.snapshot())
            .collect();
        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        instances
    }

    pub async fn send_text(
        &self,
        instance_id: &InstanceId,
        to: &str,
        content: &str,
    ) -> Result<SendReceipt, ZaplineError> {
        let entry = self.inner.entry(instance_id).await?;
        let receipt = entry
            .adapter
            .send_text(to, content)
            .await
            .inspect_err(|e| log_send_failure(&entry, to, e))?;

        entry.touch();
        self.inner.publish(
            &entry,
            EventPayload::MessageSent {
                to: to.to_string(),
                external_id: receipt.external_id.clone(),
            },
        );
        Ok(receipt)
    }

    pub async fn send_media(
        &self,
        instance_id: &InstanceId,
        to: &str,
        media_url: &str,
        caption: Option<&str>,
        media_type: MessageType,
    ) -> Result<SendReceipt, ZaplineError> {
        let entry = self.inner.entry(instance_id).await?;
        let receipt = entry
            .adapter
            .send_media(to, media_url, caption, media_type)
            .await
            .inspect_err(|e| log_send_failure(&entry, to, e))?;

        entry.touch();
        self.inner.publish(
            &entry,
            EventPayload::MediaSent {
                to: to.to_string(),
                external_id: receipt.external_id.clone(),
                media_type,
            },
        );
        Ok(receipt)
    }

    pub async fn mark_read(
        &self,
        instance_id: &InstanceId,
        chat: &str,
        message_ids: &[String],
    ) -> Result<(), ZaplineError> {
        let entry = self.inner.entry(instance_id).await?;
        entry.adapter.mark_read(chat, message_ids).await
    }

    pub async fn profile_picture_url(
        &self,
        instance_id: &InstanceId,
        jid: &str,
    ) -> Result<Option<String>, ZaplineError> {
        let entry = self.inner.entry(instance_id).await?;
        entry.adapter.profile_picture_url(jid).await
    }

    /// Subscribe to lifecycle and message events of every instance.
    pub fn subscribe(&self) -> broadcast::Receiver<ZaplineEvent> {
        self.inner.events.subscribe()
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.inner.observers
    }

    /// Reconnect attempts made for an instance since it last connected.
    pub fn reconnect_attempts(&self, instance_id: &InstanceId) -> u32 {
        self.inner.supervisor.attempt(instance_id)
    }

    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        self.inner.supervisor.policy()
    }
}

fn log_send_failure(entry: &InstanceEntry, to: &str, error: &ZaplineError) {
    warn!(
        instance_id = %entry.id(),
        tenant_id = %entry.instance.tenant_id,
        to,
        error = %error,
        "send failed"
    );
}

impl ManagerInner {
    async fn entry(&self, instance_id: &InstanceId) -> Result<Arc<InstanceEntry>, ZaplineError> {
        self.instances
            .read()
            .await
            .get(instance_id)
            .cloned()
            .ok_or_else(|| ZaplineError::InstanceNotFound {
                instance_id: instance_id.clone(),
            })
    }

    fn publish(&self, entry: &InstanceEntry, payload: EventPayload) {
        self.events.publish(ZaplineEvent::new(&entry.instance, payload));
    }

    fn reconnect_suppressed(&self, entry: &InstanceEntry) -> bool {
        entry.manual_stop.load(Ordering::SeqCst)
            || entry.retired.load(Ordering::SeqCst)
            || self.shutting_down.load(Ordering::SeqCst)
    }

    async fn stop_entry(&self, entry: &InstanceEntry) -> Result<(), ZaplineError> {
        entry.manual_stop.store(true, Ordering::SeqCst);
        self.supervisor.cancel(entry.id());
        let result = {
            let _lifecycle = entry.lifecycle.lock().await;
            // A closure handled while we waited for the lock may have armed a new timer.
            self.supervisor.clear(entry.id());
            entry.adapter.disconnect().await
        };
        entry.manual_stop.store(false, Ordering::SeqCst);
        result?;

        info!(instance_id = %entry.id(), tenant_id = %entry.instance.tenant_id, "instance stopped");
        self.observers
            .notify_disconnected(&entry.instance, &DisconnectReason::ManualStop)
            .await;
        self.publish(entry, EventPayload::InstanceStopped);
        Ok(())
    }

    async fn handle_signal(self: &Arc<Self>, entry: &Arc<InstanceEntry>, signal: AdapterSignal) {
        let generation = entry.adapter.generation();
        if signal.generation != generation {
            debug!(
                instance_id = %entry.id(),
                signal_generation = signal.generation,
                generation,
                "dropping signal of a replaced session"
            );
            return;
        }

        match signal.event {
            AdapterEvent::QrCode { qr } => {
                self.publish(entry, EventPayload::QrCode { qr });
            }
            AdapterEvent::Connected { own_jid } => {
                self.supervisor.clear(entry.id());
                entry.touch();
                self.observers.notify_connected(&entry.instance).await;
                self.publish(entry, EventPayload::InstanceConnected { own_jid });
            }
            AdapterEvent::Closed {
                reason,
                should_reconnect,
            } => {
                self.observers
                    .notify_disconnected(&entry.instance, &reason)
                    .await;

                let plan = if should_reconnect {
                    self.plan_reconnect(entry, signal.generation).await
                } else {
                    self.supervisor.clear(entry.id());
                    None
                };
                let will_reconnect = matches!(plan, Some(ReconnectPlan::Scheduled { .. }));
                self.publish(
                    entry,
                    EventPayload::InstanceDisconnected {
                        reason,
                        will_reconnect,
                    },
                );
                if let Some(plan) = plan {
                    self.carry_out(entry, signal.generation, plan).await;
                }
            }
            AdapterEvent::Message(message) => {
                entry.touch();
                self.publish(entry, EventPayload::MessageReceived { message });
            }
            AdapterEvent::MessageStatus(update) => {
                self.publish(entry, EventPayload::MessageStatus { update });
            }
            AdapterEvent::Presence(update) => {
                self.publish(entry, EventPayload::Presence { update });
            }
        }
    }

    /// Ask the supervisor for the next step, unless a stop, shutdown or newer
    /// session makes reconnecting pointless.
    async fn plan_reconnect(
        &self,
        entry: &InstanceEntry,
        generation: u64,
    ) -> Option<ReconnectPlan> {
        let _lifecycle = entry.lifecycle.lock().await;
        if self.reconnect_suppressed(entry) || entry.adapter.generation() != generation {
            debug!(instance_id = %entry.id(), "reconnect suppressed");
            return None;
        }
        Some(self.supervisor.plan(entry.id(), generation))
    }

    async fn carry_out(
        self: &Arc<Self>,
        entry: &Arc<InstanceEntry>,
        generation: u64,
        plan: ReconnectPlan,
    ) {
        match plan {
            ReconnectPlan::Scheduled {
                attempt,
                delay,
                token,
            } => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                info!(
                    instance_id = %entry.id(),
                    tenant_id = %entry.instance.tenant_id,
                    attempt,
                    delay_ms,
                    "scheduling reconnect"
                );
                self.observers
                    .notify_reconnect_attempt(&entry.instance, attempt, delay)
                    .await;
                self.publish(entry, EventPayload::InstanceReconnect { attempt, delay_ms });
                self.arm_timer(Arc::clone(entry), generation, attempt, delay, token);
            }
            ReconnectPlan::Exhausted { attempts } => {
                // A failed attempt leaves the adapter in `error`; settle on `disconnected`.
                let _lifecycle = entry.lifecycle.lock().await;
                if entry.adapter.generation() == generation
                    && entry.adapter.status() != ConnectionStatus::Disconnected
                    && let Err(e) = entry.adapter.disconnect().await
                {
                    warn!(instance_id = %entry.id(), error = %e, "failed to settle exhausted instance");
                }
                debug!(instance_id = %entry.id(), attempts, "no further reconnects");
            }
        }
    }

    fn arm_timer(
        self: &Arc<Self>,
        entry: Arc<InstanceEntry>,
        generation: u64,
        attempt: u32,
        delay: Duration,
        token: CancellationToken,
    ) {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if let Some(manager) = manager.upgrade() {
                manager.fire_reconnect(entry, generation, attempt, token).await;
            }
        });
    }

    async fn fire_reconnect(
        self: Arc<Self>,
        entry: Arc<InstanceEntry>,
        generation: u64,
        attempt: u32,
        token: CancellationToken,
    ) {
        let result = {
            let _lifecycle = entry.lifecycle.lock().await;
            if token.is_cancelled()
                || self.reconnect_suppressed(&entry)
                || entry.adapter.generation() != generation
            {
                debug!(instance_id = %entry.id(), attempt, "reconnect cancelled before firing");
                return;
            }
            self.supervisor.mark_fired(entry.id());
            info!(instance_id = %entry.id(), tenant_id = %entry.instance.tenant_id, attempt, "reconnecting");
            entry.adapter.initialize().await
        };

        if let Err(e) = result {
            warn!(
                instance_id = %entry.id(),
                tenant_id = %entry.instance.tenant_id,
                attempt,
                error = %e,
                "reconnect attempt failed"
            );
            if let Some(plan) = self.plan_reconnect(&entry, generation).await {
                let exhausted = matches!(plan, ReconnectPlan::Exhausted { .. });
                self.carry_out(&entry, generation, plan).await;
                if exhausted {
                    let reason = DisconnectReason::Transient {
                        code: None,
                        message: e.to_string(),
                    };
                    self.observers
                        .notify_disconnected(&entry.instance, &reason)
                        .await;
                    self.publish(
                        &entry,
                        EventPayload::InstanceDisconnected {
                            reason,
                            will_reconnect: false,
                        },
                    );
                }
            }
        }
    }
}

/// Consume one instance's adapter signals in order until the adapter goes away.
async fn run_listener(
    manager: Weak<ManagerInner>,
    entry: Weak<InstanceEntry>,
    mut signals: mpsc::UnboundedReceiver<AdapterSignal>,
) {
    while let Some(signal) = signals.recv().await {
        let (Some(manager), Some(entry)) = (manager.upgrade(), entry.upgrade()) else {
            break;
        };
        manager.handle_signal(&entry, signal).await;
    }
}
