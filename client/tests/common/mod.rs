#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pennote_client::{BluetoothHost, PenDevice, PenEvent, TransportError};
use tokio::sync::mpsc;
use uuid::Uuid;

/// A pen that has always been paired and never fails to connect.
pub struct ScriptedPen {
    notifications: Option<mpsc::Receiver<PenEvent>>,
    disconnected: Arc<AtomicBool>,
}

#[async_trait]
impl PenDevice for ScriptedPen {
    fn id(&self) -> &str {
        "neo-test-pen"
    }

    fn name(&self) -> Option<&str> {
        Some("Neo smartpen N2")
    }

    async fn connect_gatt(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn resolve_service(&mut self, _service: Uuid) -> Result<(), TransportError> {
        Ok(())
    }

    async fn resolve_characteristic(
        &mut self,
        _characteristic: Uuid,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn start_notifications(&mut self) -> Result<mpsc::Receiver<PenEvent>, TransportError> {
        self.notifications
            .take()
            .ok_or_else(|| TransportError::new("already subscribed"))
    }

    async fn disconnect(&mut self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedHost {
    pen: Mutex<Option<ScriptedPen>>,
}

#[async_trait]
impl BluetoothHost for ScriptedHost {
    async fn is_available(&self) -> bool {
        true
    }

    async fn request_device(
        &self,
        _name_prefixes: &[&str],
        _service: Uuid,
    ) -> Result<Box<dyn PenDevice>, TransportError> {
        let pen = self.pen.lock().unwrap().take();
        match pen {
            Some(pen) => Ok(Box::new(pen)),
            None => Err(TransportError::new("no pen in range")),
        }
    }
}

/// Test-side handle for pushing notifications into a connected pen.
pub struct PenRemote {
    notify: mpsc::Sender<PenEvent>,
    pub disconnected: Arc<AtomicBool>,
}

impl PenRemote {
    pub async fn write(&self, x: u16, y: u16, pressure: u8) {
        let [x0, x1] = x.to_le_bytes();
        let [y0, y1] = y.to_le_bytes();
        let _ = self
            .notify
            .send(PenEvent::Notification(vec![x0, x1, y0, y1, pressure]))
            .await;
    }

    pub async fn drop_link(&self) {
        let _ = self.notify.send(PenEvent::Disconnected).await;
    }
}

pub fn scripted_host() -> (Arc<ScriptedHost>, PenRemote) {
    let (notify, notifications) = mpsc::channel(64);
    let disconnected = Arc::new(AtomicBool::new(false));
    let host = Arc::new(ScriptedHost {
        pen: Mutex::new(Some(ScriptedPen {
            notifications: Some(notifications),
            disconnected: disconnected.clone(),
        })),
    });
    (
        host,
        PenRemote {
            notify,
            disconnected,
        },
    )
}

/// Polls `check` until it holds, failing the test after about a second.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
