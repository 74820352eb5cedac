//! Bluetooth host that plays back a recorded notification capture.
//!
//! A capture is JSON lines, one notification per line:
//! `{"delay_ms": 8, "payload": [232, 3, 232, 3, 120]}`. Blank lines and lines
//! starting with `#` are skipped.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use pennote_client::{BluetoothHost, PenDevice, PenEvent, TransportError};
use pennote_shared::pen::{CHARACTERISTIC_UUID, SERVICE_UUID};

#[cfg(test)]
#[path = "replay_test.rs"]
mod replay_test;

const REPLAY_DEVICE_NAME: &str = "Neo replay";

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CaptureLine {
    #[serde(default)]
    pub delay_ms: u64,
    pub payload: Vec<u8>,
}

pub fn parse_capture(raw: &str) -> Result<Vec<CaptureLine>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid capture record on line {}", index + 1))
        })
        .collect()
}

/// Hands out a single device that replays `lines`, then reports a
/// device-side disconnect.
pub struct ReplayHost {
    lines: Mutex<Option<Vec<CaptureLine>>>,
}

impl ReplayHost {
    pub fn new(lines: Vec<CaptureLine>) -> Self {
        Self {
            lines: Mutex::new(Some(lines)),
        }
    }
}

#[async_trait]
impl BluetoothHost for ReplayHost {
    async fn is_available(&self) -> bool {
        true
    }

    async fn request_device(
        &self,
        _name_prefixes: &[&str],
        _service: Uuid,
    ) -> Result<Box<dyn PenDevice>, TransportError> {
        let lines = self
            .lines
            .lock()
            .map_err(|_| TransportError::new("replay host poisoned"))?
            .take()
            .ok_or_else(|| TransportError::new("capture already replayed"))?;
        Ok(Box::new(ReplayPen {
            lines: Some(lines),
            player: None,
        }))
    }
}

struct ReplayPen {
    lines: Option<Vec<CaptureLine>>,
    player: Option<JoinHandle<()>>,
}

#[async_trait]
impl PenDevice for ReplayPen {
    fn id(&self) -> &str {
        "replay"
    }

    fn name(&self) -> Option<&str> {
        Some(REPLAY_DEVICE_NAME)
    }

    async fn connect_gatt(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn resolve_service(&mut self, service: Uuid) -> Result<(), TransportError> {
        if service != SERVICE_UUID {
            return Err(TransportError::new(format!("no service {service}")));
        }
        Ok(())
    }

    async fn resolve_characteristic(
        &mut self,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        if characteristic != CHARACTERISTIC_UUID {
            return Err(TransportError::new(format!("no characteristic {characteristic}")));
        }
        Ok(())
    }

    async fn start_notifications(&mut self) -> Result<mpsc::Receiver<PenEvent>, TransportError> {
        let lines = self
            .lines
            .take()
            .ok_or_else(|| TransportError::new("notifications already started"))?;
        let (sender, receiver) = mpsc::channel(64);
        self.player = Some(tokio::spawn(async move {
            for line in lines {
                if line.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(line.delay_ms)).await;
                }
                if sender.send(PenEvent::Notification(line.payload)).await.is_err() {
                    return;
                }
            }
            let _ = sender.send(PenEvent::Disconnected).await;
        }));
        Ok(receiver)
    }

    async fn disconnect(&mut self) {
        if let Some(player) = self.player.take() {
            player.abort();
        }
    }
}
