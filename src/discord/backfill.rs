use futures::{StreamExt, stream};
use tracing::instrument;

use crate::constants::{BACKFILL_CONCURRENCY, BACKFILL_MESSAGE_LIMIT, GUILD_TEXT_CHANNEL};
use crate::discord::MentionSink;
use crate::discord::rest::DiscordRest;
use crate::discord::types::{Channel, DiscordMessage};

/// Scans recent history in every text channel of `guild_ids` and records all mentions of
/// `bot_id` with a single [`MentionSink::record_backfill`] call.
#[instrument(skip(rest, guild_ids, sink), fields(guilds = guild_ids.len()))]
pub async fn run_backfill<S>(rest: &DiscordRest, guild_ids: &[String], bot_id: &str, sink: &S)
where
    S: MentionSink + ?Sized,
{
    let users = collect_mentions(rest, guild_ids, bot_id).await;
    tracing::info!(mentions = users.len(), "backfill pass complete");

    sink.record_backfill(users).await;
}

/// Display names of the authors of every recent message mentioning `bot_id`. Guilds or
/// channels that fail to fetch are logged and skipped.
#[instrument(skip(rest, guild_ids))]
pub async fn collect_mentions(
    rest: &DiscordRest,
    guild_ids: &[String],
    bot_id: &str,
) -> Vec<String> {
    let mut channels: Vec<Channel> = Vec::new();
    for guild_id in guild_ids {
        match rest.guild_channels(guild_id).await {
            Ok(found) => channels.extend(
                found
                    .into_iter()
                    .filter(|channel| channel.kind == GUILD_TEXT_CHANNEL),
            ),
            Err(e) => tracing::error!(error = ?e, %guild_id, "failed to list guild channels"),
        }
    }

    tracing::debug!(channels = channels.len(), "fetching channel history");

    let per_channel: Vec<Vec<String>> = stream::iter(channels)
        .map(|channel| async move {
            match rest
                .channel_messages(&channel.id, BACKFILL_MESSAGE_LIMIT)
                .await
            {
                Ok(messages) => mentioning_authors(&messages, bot_id),
                Err(e) => {
                    tracing::error!(
                        error = ?e,
                        channel_id = %channel.id,
                        channel_name = channel.name.as_deref().unwrap_or_default(),
                        "failed to fetch channel history, skipping"
                    );
                    Vec::new()
                }
            }
        })
        .buffer_unordered(BACKFILL_CONCURRENCY)
        .collect()
        .await;

    per_channel.into_iter().flatten().collect()
}

pub fn mentioning_authors(messages: &[DiscordMessage], bot_id: &str) -> Vec<String> {
    messages
        .iter()
        .filter(|msg| msg.mentions_user(bot_id))
        .map(|msg| msg.author.display_name().to_string())
        .collect()
}
