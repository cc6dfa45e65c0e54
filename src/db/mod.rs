use std::collections::BTreeMap;

use thiserror::Error;

pub mod leaderboard;
pub mod store;

pub mod prelude {
    pub use crate::db::MentionCounts;
    pub use crate::db::leaderboard::{LeaderboardEntry, frame, top};
    pub use crate::db::store::CounterStore;
}

/// User identifier to mention count. Every key present has a count of at least 1.
pub type MentionCounts = BTreeMap<String, u64>;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable record I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
