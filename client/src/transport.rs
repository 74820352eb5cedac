//! Host Bluetooth seam. A platform backend implements these traits; the
//! device session only ever talks to them.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// What a subscribed characteristic delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PenEvent {
    Notification(Vec<u8>),
    /// The link dropped on the device side.
    Disconnected,
}

#[async_trait]
pub trait BluetoothHost: Send + Sync {
    async fn is_available(&self) -> bool;

    /// Asks the user to pick a device whose name starts with one of
    /// `name_prefixes` and that advertises `service`.
    async fn request_device(
        &self,
        name_prefixes: &[&str],
        service: Uuid,
    ) -> Result<Box<dyn PenDevice>, TransportError>;
}

#[async_trait]
pub trait PenDevice: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> Option<&str>;

    async fn connect_gatt(&mut self) -> Result<(), TransportError>;
    async fn resolve_service(&mut self, service: Uuid) -> Result<(), TransportError>;
    async fn resolve_characteristic(&mut self, characteristic: Uuid)
        -> Result<(), TransportError>;
    async fn start_notifications(&mut self) -> Result<mpsc::Receiver<PenEvent>, TransportError>;
    async fn disconnect(&mut self);
}
