//! Pen connection lifecycle: connect chain, notification pump, upload buffer.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use pennote_shared::pen::{self, CHARACTERISTIC_UUID, NAME_PREFIXES, SERVICE_UUID};
use pennote_shared::{Sample, UploadAck};

use crate::config::DeviceConfig;
use crate::store::{StoreError, StrokeUploader};
use crate::transport::{BluetoothHost, PenDevice, PenEvent, TransportError};

#[cfg(test)]
#[path = "device_test.rs"]
mod device_test;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the canvas feed receives from a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Sample(Sample),
    Disconnected,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectStep {
    RequestDevice,
    OpenGatt,
    ResolveService,
    ResolveCharacteristic,
    StartNotifications,
}

impl fmt::Display for ConnectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectStep::RequestDevice => "request device",
            ConnectStep::OpenGatt => "open GATT server",
            ConnectStep::ResolveService => "resolve service",
            ConnectStep::ResolveCharacteristic => "resolve characteristic",
            ConnectStep::StartNotifications => "start notifications",
        };
        f.write_str(label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Bluetooth is not available on this host")]
    CapabilityUnavailable,
    #[error("failed to {step}: {message}")]
    ConnectFailure { step: ConnectStep, message: String },
    #[error("a pen connection is already active")]
    AlreadyActive,
    #[error("connection attempt was cancelled")]
    Cancelled,
    #[error("no pen connected")]
    NotConnected,
    #[error("upload failed: {0}")]
    Upload(#[from] StoreError),
}

/// Serializable result of a connect attempt, for UI surfaces.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectOutcome {
    pub fn from_result(result: &Result<(), DeviceError>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                error: None,
            },
            Err(error) => Self {
                success: false,
                error: Some(error.to_string()),
            },
        }
    }
}

struct Link {
    device: Box<dyn PenDevice>,
    id: String,
    name: Option<String>,
    pump: JoinHandle<()>,
}

/// Samples awaiting upload. Each sample takes the next sequence number and
/// `first_seq` is the number of `samples[0]`, so an acknowledgement can tell
/// which of the buffered samples it covers.
#[derive(Default)]
struct PendingBuffer {
    first_seq: u64,
    samples: Vec<Sample>,
}

impl PendingBuffer {
    fn clear(&mut self) {
        self.first_seq += self.samples.len() as u64;
        self.samples.clear();
    }

    /// Drops whatever is still buffered of the `count` samples numbered from
    /// `start`. Returns how many were dropped.
    fn acknowledge(&mut self, start: u64, count: usize) -> usize {
        let end = start + count as u64;
        let covered = usize::try_from(end.saturating_sub(self.first_seq)).unwrap_or(usize::MAX);
        let sent = covered.min(self.samples.len());
        self.samples.drain(..sent);
        self.first_seq += sent as u64;
        sent
    }
}

struct Inner {
    state: watch::Sender<ConnectionState>,
    /// Bumped on every teardown; a pump only acts while its generation is
    /// current.
    generation: AtomicU64,
    pending: Mutex<PendingBuffer>,
    link: Mutex<Option<Link>>,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Buffers one notification for upload and forwards it to the canvas
    /// feed. Both happen under the buffer lock, so a sample is either in
    /// both places or in neither.
    async fn accept(
        &self,
        generation: u64,
        payload: &[u8],
        events: &mpsc::Sender<DeviceEvent>,
    ) {
        let sample = match pen::decode(payload) {
            Ok(sample) => sample,
            Err(error) => {
                tracing::warn!(error = %error, "dropping undecodable pen notification");
                return;
            }
        };
        let mut pending = self.pending.lock().await;
        // A disconnect may have cleared the buffer while this pump waited.
        if !self.is_current(generation) {
            return;
        }
        pending.samples.push(sample);
        match events.try_send(DeviceEvent::Sample(sample)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("canvas feed is full, dropping pen sample");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("canvas feed closed");
            }
        }
    }

    /// Device-side disconnect or end of the notification stream.
    async fn lost_link(&self, generation: u64, events: &mpsc::Sender<DeviceEvent>) {
        let mut link = self.link.lock().await;
        if !self.is_current(generation) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        let name = link.take().and_then(|link| link.name);
        self.state.send_replace(ConnectionState::Disconnected);
        tracing::info!(device = name.as_deref().unwrap_or("unknown"), "pen disconnected");
        notify_disconnected(events);
    }
}

fn notify_disconnected(events: &mpsc::Sender<DeviceEvent>) {
    if let Err(error) = events.try_send(DeviceEvent::Disconnected) {
        tracing::debug!(error = %error, "could not deliver disconnect marker");
    }
}

async fn run_step<T>(
    step: ConnectStep,
    limit: Duration,
    future: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, DeviceError> {
    match tokio::time::timeout(limit, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(DeviceError::ConnectFailure {
            step,
            message: error.to_string(),
        }),
        Err(_) => Err(DeviceError::ConnectFailure {
            step,
            message: format!("timed out after {limit:?}"),
        }),
    }
}

async fn pump(
    inner: Arc<Inner>,
    generation: u64,
    mut notifications: mpsc::Receiver<PenEvent>,
    events: mpsc::Sender<DeviceEvent>,
) {
    while let Some(event) = notifications.recv().await {
        if !inner.is_current(generation) {
            return;
        }
        match event {
            PenEvent::Notification(payload) => {
                inner.accept(generation, &payload, &events).await;
            }
            PenEvent::Disconnected => break,
        }
    }
    inner.lost_link(generation, &events).await;
}

/// Owns at most one pen connection at a time.
pub struct DeviceSession {
    host: Arc<dyn BluetoothHost>,
    config: DeviceConfig,
    inner: Arc<Inner>,
    events: mpsc::Sender<DeviceEvent>,
}

impl DeviceSession {
    /// Returns the session and the receiving end of its canvas feed.
    pub fn new(
        host: Arc<dyn BluetoothHost>,
        config: DeviceConfig,
    ) -> (Self, mpsc::Receiver<DeviceEvent>) {
        let (events, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let inner = Arc::new(Inner {
            state,
            generation: AtomicU64::new(0),
            pending: Mutex::new(PendingBuffer::default()),
            link: Mutex::new(None),
        });
        let session = Self {
            host,
            config,
            inner,
            events,
        };
        (session, receiver)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub async fn device_id(&self) -> Option<String> {
        self.inner.link.lock().await.as_ref().map(|link| link.id.clone())
    }

    pub async fn device_name(&self) -> Option<String> {
        self.inner
            .link
            .lock()
            .await
            .as_ref()
            .and_then(|link| link.name.clone())
    }

    pub async fn pending_samples(&self) -> Vec<Sample> {
        self.inner.pending.lock().await.samples.clone()
    }

    pub async fn clear_pending(&self) {
        self.inner.pending.lock().await.clear();
    }

    /// Runs the connect chain. On failure every partially opened resource is
    /// released and the session is back to `Disconnected`.
    pub async fn connect(&self) -> Result<(), DeviceError> {
        if !self.host.is_available().await {
            tracing::warn!("Bluetooth unavailable, cannot connect a pen");
            return Err(DeviceError::CapabilityUnavailable);
        }
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(DeviceError::AlreadyActive);
        }
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let result = self.open(generation).await;
        if let Err(error) = &result {
            tracing::warn!(error = %error, "pen connection failed");
            if self.inner.is_current(generation) {
                self.inner.state.send_replace(ConnectionState::Disconnected);
            }
        }
        result
    }

    async fn open(&self, generation: u64) -> Result<(), DeviceError> {
        let mut device = run_step(
            ConnectStep::RequestDevice,
            self.config.connect_timeout,
            self.host.request_device(&NAME_PREFIXES, SERVICE_UUID),
        )
        .await?;

        let notifications = match self.subscribe_device(device.as_mut()).await {
            Ok(notifications) => notifications,
            Err(error) => {
                device.disconnect().await;
                return Err(error);
            }
        };

        let mut link = self.inner.link.lock().await;
        if !self.inner.is_current(generation) {
            drop(link);
            device.disconnect().await;
            return Err(DeviceError::Cancelled);
        }
        let pump = tokio::spawn(pump(
            self.inner.clone(),
            generation,
            notifications,
            self.events.clone(),
        ));
        let id = device.id().to_string();
        let name = device.name().map(str::to_string);
        tracing::info!(
            device = name.as_deref().unwrap_or("unknown"),
            id = %id,
            "pen connected"
        );
        *link = Some(Link {
            device,
            id,
            name,
            pump,
        });
        self.inner.state.send_replace(ConnectionState::Connected);
        Ok(())
    }

    async fn subscribe_device(
        &self,
        device: &mut dyn PenDevice,
    ) -> Result<mpsc::Receiver<PenEvent>, DeviceError> {
        if let Some(name) = device.name() {
            if !pen::matches_name_prefix(name) {
                return Err(DeviceError::ConnectFailure {
                    step: ConnectStep::RequestDevice,
                    message: format!("{name} is not a supported pen"),
                });
            }
        }
        let limit = self.config.connect_timeout;
        run_step(ConnectStep::OpenGatt, limit, device.connect_gatt()).await?;
        run_step(
            ConnectStep::ResolveService,
            limit,
            device.resolve_service(SERVICE_UUID),
        )
        .await?;
        run_step(
            ConnectStep::ResolveCharacteristic,
            limit,
            device.resolve_characteristic(CHARACTERISTIC_UUID),
        )
        .await?;
        run_step(
            ConnectStep::StartNotifications,
            self.config.subscribe_timeout,
            device.start_notifications(),
        )
        .await
    }

    /// Tears down the connection. A no-op when already disconnected.
    pub async fn disconnect(&self) -> Result<(), DeviceError> {
        let mut link = self.inner.link.lock().await;
        let taken = link.take();
        if taken.is_none() && self.state() == ConnectionState::Disconnected {
            return Ok(());
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut taken) = taken {
            taken.pump.abort();
            taken.device.disconnect().await;
            tracing::info!(
                device = taken.name.as_deref().unwrap_or("unknown"),
                "pen disconnected"
            );
        }
        drop(link);
        self.inner.pending.lock().await.clear();
        self.inner.state.send_replace(ConnectionState::Disconnected);
        notify_disconnected(&self.events);
        Ok(())
    }

    /// Sends every buffered sample in one request. Only the samples that
    /// were sent are removed, and only on success; samples buffered after
    /// the request started are kept, even across a reconnect.
    pub async fn upload(&self, uploader: &dyn StrokeUploader) -> Result<UploadAck, DeviceError> {
        if self.state() != ConnectionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        let device_id = self.device_id().await.ok_or(DeviceError::NotConnected)?;
        let (start, batch) = {
            let pending = self.inner.pending.lock().await;
            (pending.first_seq, pending.samples.clone())
        };
        let ack = uploader.upload_strokes(&device_id, &batch).await?;

        let sent = self.inner.pending.lock().await.acknowledge(start, batch.len());
        tracing::info!(
            samples = batch.len(),
            drained = sent,
            device = %device_id,
            "uploaded pen samples"
        );
        Ok(ack)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut link) = self.inner.link.try_lock() {
            if let Some(link) = link.take() {
                link.pump.abort();
            }
        }
    }
}
