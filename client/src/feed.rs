use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::device::DeviceEvent;
use crate::surface::SharedCanvas;

#[cfg(test)]
#[path = "feed_test.rs"]
mod feed_test;

/// Drains a device session's events into the canvas.
///
/// The open pen stroke is committed when no sample arrives within
/// `pen_lift_gap`, on a disconnect marker, and when the channel closes.
pub fn spawn_device_feed(
    canvas: SharedCanvas,
    mut events: mpsc::Receiver<DeviceEvent>,
    pen_lift_gap: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pen_down = false;
        loop {
            let next = if pen_down {
                match tokio::time::timeout(pen_lift_gap, events.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        canvas.lock().await.end_device_stroke();
                        pen_down = false;
                        continue;
                    }
                }
            } else {
                events.recv().await
            };
            match next {
                Some(DeviceEvent::Sample(sample)) => {
                    canvas.lock().await.ingest_device_sample(&sample);
                    pen_down = true;
                }
                Some(DeviceEvent::Disconnected) => {
                    canvas.lock().await.end_device_stroke();
                    pen_down = false;
                }
                None => {
                    canvas.lock().await.end_device_stroke();
                    break;
                }
            }
        }
        tracing::debug!("device feed closed");
    })
}
