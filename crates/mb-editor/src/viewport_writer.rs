//! Coalesced viewport persistence.
//!
//! Pan and zoom produce a stream of viewport changes; only the last one in
//! a trailing window is written. The pending write is an explicit task
//! handle so a canvas switch can flush or cancel it before state reloads.

use mb_core::CanvasViewport;
use mb_storage::{PersistenceGateway, StorageResult};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Pending {
    /// Latest value not yet handed to the gateway.
    write: Option<(String, CanvasViewport)>,
    /// Bumped on every schedule, flush and cancel; a timer that wakes up
    /// with a stale generation does nothing.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Pending {
    fn disarm(&mut self) -> Option<(String, CanvasViewport)> {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
        self.write.take()
    }
}

pub struct ViewportWriter {
    gateway: PersistenceGateway,
    delay: Duration,
    inner: Arc<Mutex<Pending>>,
}

impl ViewportWriter {
    pub fn new(gateway: PersistenceGateway, delay: Duration) -> Self {
        Self {
            gateway,
            delay,
            inner: Arc::new(Mutex::new(Pending::default())),
        }
    }

    /// Replace the pending value and restart the window.
    ///
    /// Outside a tokio runtime no timer is armed; the value stays pending
    /// until [`flush`](Self::flush).
    pub fn schedule(&self, canvas: &str, viewport: CanvasViewport) {
        let mut pending = self.inner.lock();
        pending.disarm();
        pending.write = Some((canvas.to_string(), viewport));

        let Ok(runtime) = Handle::try_current() else {
            log::debug!("no runtime; viewport write for {canvas} waits for a flush");
            return;
        };
        let generation = pending.generation;
        let inner = self.inner.clone();
        let gateway = self.gateway.clone();
        let delay = self.delay;
        pending.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let write = {
                let mut pending = inner.lock();
                if pending.generation != generation {
                    return;
                }
                pending.timer = None;
                pending.write.take()
            };
            if let Some((canvas, viewport)) = write {
                if let Err(e) = gateway.save_viewport(&canvas, &viewport).await {
                    log::warn!("viewport write for canvas {canvas} failed: {e}");
                }
            }
        }));
    }

    /// Hand the pending value to the gateway now. The write is queued
    /// before this returns; awaiting the future waits for it to land.
    /// `None` when nothing was pending.
    pub fn flush(
        &self,
    ) -> Option<impl Future<Output = StorageResult<()>> + Send + 'static + use<>> {
        let (canvas, viewport) = self.inner.lock().disarm()?;
        log::debug!("flushing viewport for canvas {canvas}");
        Some(self.gateway.save_viewport(&canvas, &viewport))
    }

    /// Drop the pending value. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        self.inner.lock().disarm().is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.lock().write.is_some()
    }
}

impl Drop for ViewportWriter {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.lock().timer.take() {
            timer.abort();
        }
    }
}
