//! Change subscriptions as tick streams.
//!
//! A subscription yields one tick immediately, then one tick per external
//! mutation announcement on the target. Ticks carry no payload; the consumer
//! re-queries on each one. Rapid bursts may coalesce into fewer ticks, but a
//! tick is never lost entirely: the channel holds one pending tick, and a
//! full channel already means a refresh is due.

use crate::error::{IndexError, Result};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use store_traits::{CancelToken, ChangeListener, ContentStore};
use tokio::sync::mpsc;

/// Payload-free change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

/// Creates tick streams from a store's observer protocol.
#[derive(Clone)]
pub struct ChangeWatcher {
    store: Arc<dyn ContentStore>,
}

impl ChangeWatcher {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        ChangeWatcher { store }
    }

    /// Subscribe to mutations on a target.
    ///
    /// The stream's first tick is synthesized before the listener is
    /// registered, so a consumer that queries on every tick always sees the
    /// current state even if the target never changes again.
    pub fn subscribe(&self, target: &str) -> Result<TickStream> {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Tick);
        let listener: ChangeListener = Arc::new(move || {
            // A full channel means a tick is already pending; dropping this
            // one coalesces the burst instead of blocking the announcer.
            let _ = tx.try_send(Tick);
        });
        let token = self
            .store
            .register(target, listener)
            .map_err(|err| IndexError::store_unavailable(target, &err))?;
        Ok(TickStream { rx, _token: token })
    }
}

/// Stream of [`Tick`]s for one target. Dropping the stream deregisters the
/// underlying listener synchronously.
pub struct TickStream {
    rx: mpsc::Receiver<Tick>,
    _token: CancelToken,
}

impl Stream for TickStream {
    type Item = Tick;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Tick>> {
        self.rx.poll_recv(cx)
    }
}
