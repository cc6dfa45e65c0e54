use async_trait::async_trait;

pub mod backfill;
pub mod gateway;
pub mod rest;
pub mod types;

#[cfg(test)]
pub mod test_server;

/// Where the Discord client hands off mentions of the bot
#[async_trait]
pub trait MentionSink: Send + Sync {
    /// A live message by `user` mentioned the bot
    async fn record_mention(&self, user: &str);

    /// All mentions found by the startup history scan, one entry per mentioning message
    async fn record_backfill(&self, users: Vec<String>);
}
