use core::fmt;

use http::header::{AUTHORIZATION, InvalidHeaderValue};
use http::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::constants::DISCORD_API_URL;
use crate::discord::types::{Channel, DiscordMessage};

/// Minimal Discord REST client covering the history endpoints used by the backfill
#[derive(Clone)]
pub struct DiscordRest {
    client: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for DiscordRest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // keep the auth header out of logs
        f.debug_struct("DiscordRest")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DiscordRest {
    pub fn new(token: &str) -> DiscordResult<Self> {
        Self::with_base_url(token, DISCORD_API_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> DiscordResult<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!(
                "DiscordBot (",
                env!("CARGO_PKG_NAME"),
                ", ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(self))]
    pub async fn guild_channels(&self, guild_id: &str) -> DiscordResult<Vec<Channel>> {
        self.fetch(&format!("/guilds/{guild_id}/channels")).await
    }

    /// Most recent `limit` messages in a channel, newest first
    #[instrument(skip(self))]
    pub async fn channel_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> DiscordResult<Vec<DiscordMessage>> {
        self.fetch(&format!("/channels/{channel_id}/messages?limit={limit}"))
            .await
    }

    /// Performs a GET request to `path` and parses the response body as `T`
    async fn fetch<T>(&self, path: &str) -> DiscordResult<T>
    where
        T: DeserializeOwned + fmt::Debug,
    {
        let uri = format!("{}{}", self.base_url, path);
        let res = self.client.get(uri).send().await?;

        let status = res.status();
        if !status.is_success() {
            tracing::error!(code = %status, path, "non-2xx response from discord");

            // discord usually explains itself with `{ "message": ..., "code": ... }`
            return Err(match res.json::<Value>().await {
                Ok(body) => DiscordErr::FetchErrWithBody {
                    status: status.as_u16(),
                    body,
                },
                Err(_) => DiscordErr::FetchErr(status.to_string()),
            });
        }

        if let Some(remaining) = res.headers().get("x-ratelimit-remaining") {
            tracing::trace!(ratelimit_remaining = ?remaining, path, "rate-limit bucket");
        }

        Ok(res.json::<T>().await?)
    }
}

pub type DiscordResult<T> = core::result::Result<T, DiscordErr>;

#[derive(Debug, Error)]
pub enum DiscordErr {
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    HeaderError(#[from] InvalidHeaderValue),

    #[error("discord request failed: {0}")]
    FetchErr(String),

    #[error("discord request failed with status {status}: {body}")]
    FetchErrWithBody { status: u16, body: Value },
}
