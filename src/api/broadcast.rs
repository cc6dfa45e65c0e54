//! Fan-out of leaderboard frames to open live-feed connections.
//!
//! Every connection gets its own unbounded queue so a publish never waits on a slow viewer. A
//! connection leaves the hub when its [`Subscription`] is dropped (the SSE body went away) or
//! when a publish finds its receiver already gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::instrument;
use uuid::Uuid;

/// Serialized leaderboard, shared between every connection it is sent to
pub type Frame = Arc<str>;

#[derive(Debug, Default)]
pub struct BroadcastHub {
    connections: Mutex<HashMap<Uuid, UnboundedSender<Frame>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn connections(&self) -> MutexGuard<'_, HashMap<Uuid, UnboundedSender<Frame>>> {
        // every critical section is a single map operation, so a poisoned map is still whole
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new connection with `initial` already queued as its first frame
    #[instrument(skip(self, initial))]
    pub fn subscribe(self: &Arc<Self>, initial: Frame) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        // receiver is held locally, this cannot fail
        _ = tx.send(initial);

        let mut connections = self.connections();
        connections.insert(id, tx);
        tracing::debug!(%id, connected = connections.len(), "live feed subscribed");

        Subscription {
            id,
            receiver: rx,
            hub: Arc::clone(self),
        }
    }

    /// Returns whether `id` was still connected
    #[instrument(skip(self))]
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let mut connections = self.connections();
        let removed = connections.remove(&id).is_some();
        if removed {
            tracing::debug!(%id, connected = connections.len(), "live feed unsubscribed");
        }

        removed
    }

    /// Queues `frame` on every connection, pruning the ones whose receiver is gone. Returns the
    /// number of connections the frame was queued on.
    #[instrument(skip(self, frame))]
    pub fn publish(&self, frame: Frame) -> usize {
        let mut connections = self.connections();
        let before = connections.len();

        connections.retain(|id, tx| match tx.send(Arc::clone(&frame)) {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(%id, "dropping closed live feed connection");
                false
            }
        });

        let delivered = connections.len();
        tracing::debug!(delivered, pruned = before - delivered, "leaderboard published");

        delivered
    }

    pub fn len(&self) -> usize {
        self.connections().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One viewer's end of the hub. Dropping it unsubscribes the connection.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: UnboundedReceiver<Frame>,
    hub: Arc<BroadcastHub>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
