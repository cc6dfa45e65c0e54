use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::api::broadcast::{BroadcastHub, Frame, Subscription};
use crate::constants::LEADERBOARD_SIZE;
use crate::db::prelude::*;
use crate::discord::MentionSink;

/// Mention counts plus the live viewers watching them.
///
/// Every mutation runs as one locked step: change the counts, then [`MentionService::flush`]
/// (persist + publish). Subscribing takes the same lock, so a viewer's first frame and every
/// frame after it arrive in mutation order.
#[derive(Debug)]
pub struct MentionService {
    store: Mutex<CounterStore>,
    hub: Arc<BroadcastHub>,
}

impl MentionService {
    pub fn new(store: CounterStore, hub: Arc<BroadcastHub>) -> Self {
        Self {
            store: Mutex::new(store),
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Counts one mention by `user`, then flushes
    #[instrument(skip(self))]
    pub async fn increment(&self, user: &str) -> u64 {
        let mut store = self.store.lock().await;
        let count = store.increment(user);
        tracing::info!(user, count, "mention counted");

        self.flush(&store).await;
        count
    }

    /// Counts one mention per entry in `users` and flushes once at the end, even when `users`
    /// is empty
    #[instrument(skip(self, users))]
    pub async fn increment_many<I>(&self, users: I) -> usize
    where
        I: IntoIterator<Item = String> + Send,
        I::IntoIter: Send,
    {
        let mut store = self.store.lock().await;
        let mut counted = 0;
        for user in users {
            store.increment(&user);
            counted += 1;
        }
        tracing::info!(counted, users = store.all().len(), "batch of mentions counted");

        self.flush(&store).await;
        counted
    }

    /// Registers a live viewer, queueing the current board as its first frame
    pub async fn subscribe(&self) -> Subscription {
        let store = self.store.lock().await;
        self.hub.subscribe(Self::project(&store))
    }

    /// Re-sends the current board to every viewer
    #[cfg(test)]
    pub async fn publish(&self) -> usize {
        let store = self.store.lock().await;
        self.hub.publish(Self::project(&store))
    }

    #[cfg(test)]
    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        top(self.store.lock().await.all(), LEADERBOARD_SIZE)
    }

    #[cfg(test)]
    pub async fn counts(&self) -> MentionCounts {
        self.store.lock().await.all().clone()
    }

    /// Persists and publishes the state held by `store`. A failed write is logged and the
    /// in-memory counts keep serving. Nothing is serialized while no viewer is connected.
    async fn flush(&self, store: &CounterStore) {
        if let Err(e) = store.persist().await {
            tracing::error!(error = ?e, path = %store.path().display(), "failed to persist mention counts");
        }

        if self.hub.is_empty() {
            tracing::trace!("no live viewers, skipping publish");
            return;
        }

        self.hub.publish(Self::project(store));
    }

    fn project(store: &CounterStore) -> Frame {
        Arc::from(frame(&top(store.all(), LEADERBOARD_SIZE)))
    }
}

#[async_trait]
impl MentionSink for MentionService {
    async fn record_mention(&self, user: &str) {
        self.increment(user).await;
    }

    async fn record_backfill(&self, users: Vec<String>) {
        self.increment_many(users).await;
    }
}
