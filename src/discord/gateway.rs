use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, interval_at};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::instrument;

use crate::constants::{
    DISCORD_GATEWAY_URL, GATEWAY_INTENTS, GATEWAY_QUERY, GATEWAY_RECONNECT_DELAY_SECS,
    SESSION_ENDING_CLOSE_CODES,
};
use crate::discord::MentionSink;
use crate::discord::backfill::run_backfill;
use crate::discord::rest::{DiscordErr, DiscordRest};
use crate::discord::types::{DiscordMessage, GatewayPayload, Hello, Opcode, Ready};

pub type Writer = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Spawns the gateway task. It reconnects forever; connection failures are logged, never fatal.
#[instrument(skip(token, sink))]
pub fn start_gateway<S>(token: &str, sink: Arc<S>) -> GatewayResult<JoinHandle<()>>
where
    S: MentionSink + 'static,
{
    let mut gateway = Gateway::new(DISCORD_GATEWAY_URL, token, sink)?;

    Ok(tokio::spawn(async move {
        gateway.run().await;
    }))
}

/// What the socket loop should do after a payload has been handled
#[derive(Debug, PartialEq, Eq)]
pub enum GatewayAction {
    None,
    /// Hello received: start heartbeating every `Duration` and send the handshake payload
    /// (Identify, or Resume when the previous session can be picked up)
    Handshake(Duration, GatewayPayload),
    Heartbeat,
    Reconnect(Reconnect),
    Backfill { guild_ids: Vec<String>, bot_id: String },
}

/// How soon the next connection attempt is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    Now,
    AfterDelay,
}

/// Per-process gateway state that survives reconnects
#[derive(Debug, Default)]
pub struct GatewaySession {
    pub bot_id: Option<String>,
    pub session_id: Option<String>,
    pub resume_url: Option<String>,
    pub sequence: Option<u64>,
    pub heartbeat_acked: bool,
    pub backfilled: bool,
}

impl GatewaySession {
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    /// Forgets the session so the next connection identifies from scratch. The bot id is kept.
    pub fn reset(&mut self) {
        self.session_id = None;
        self.resume_url = None;
        self.sequence = None;
    }
}

#[derive(Debug)]
pub struct Gateway<S> {
    url: String,
    token: String,
    rest: DiscordRest,
    sink: Arc<S>,
    session: GatewaySession,
}

impl<S> Gateway<S>
where
    S: MentionSink + 'static,
{
    pub fn new(url: &str, token: &str, sink: Arc<S>) -> GatewayResult<Self> {
        Ok(Self {
            url: url.to_string(),
            token: token.to_string(),
            rest: DiscordRest::new(token)?,
            sink,
            session: GatewaySession::default(),
        })
    }

    #[cfg(test)]
    pub fn session(&self) -> &GatewaySession {
        &self.session
    }

    pub async fn run(&mut self) {
        loop {
            let url = self.connect_url();
            let reconnect = match self.connect(url).await {
                Ok(reconnect) => reconnect,
                Err(e) => {
                    tracing::error!(error = ?e, "gateway connection failed");
                    Reconnect::AfterDelay
                }
            };

            if reconnect == Reconnect::AfterDelay {
                tracing::info!(delay_secs = GATEWAY_RECONNECT_DELAY_SECS, "reconnecting to gateway");
                tokio::time::sleep(Duration::from_secs(GATEWAY_RECONNECT_DELAY_SECS)).await;
            }
        }
    }

    /// The session's resume host when it can be resumed, otherwise the default gateway
    pub fn connect_url(&self) -> String {
        match &self.session.resume_url {
            Some(url) if self.session.can_resume() => {
                format!("{}/{}", url.trim_end_matches('/'), GATEWAY_QUERY)
            }
            _ => self.url.clone(),
        }
    }

    /// Runs a single socket connection until the gateway closes it or asks for a reconnect
    #[instrument(skip(self))]
    async fn connect(&mut self, url: String) -> GatewayResult<Reconnect> {
        let (stream, _) = connect_async(url.as_str()).await?;
        let (mut writer, mut reader) = stream.split();
        let mut heartbeat: Option<Interval> = None;

        tracing::info!(resuming = self.session.can_resume(), "gateway socket open");

        loop {
            tokio::select! {
                incoming = reader.next() => {
                    let Some(incoming) = incoming else {
                        return Ok(Reconnect::AfterDelay);
                    };

                    let payload = match incoming? {
                        Message::Text(text) => serde_json::from_str::<GatewayPayload>(text.as_str())?,
                        Message::Close(frame) => {
                            tracing::warn!(frame = ?frame, "gateway sent close");
                            if let Some(frame) = &frame
                                && SESSION_ENDING_CLOSE_CODES.contains(&u16::from(frame.code))
                            {
                                self.session.reset();
                            }
                            return Ok(Reconnect::AfterDelay);
                        }
                        _ => continue,
                    };

                    match self.handle_payload(payload).await? {
                        GatewayAction::None => (),
                        GatewayAction::Handshake(period, handshake) => {
                            heartbeat = Some(interval_at(Instant::now() + period, period));
                            send(&mut writer, &handshake).await?;
                        }
                        GatewayAction::Heartbeat => {
                            send(&mut writer, &heartbeat_payload(self.session.sequence)).await?;
                        }
                        GatewayAction::Reconnect(reconnect) => return Ok(reconnect),
                        GatewayAction::Backfill { guild_ids, bot_id } => {
                            let rest = self.rest.clone();
                            let sink = Arc::clone(&self.sink);
                            tokio::spawn(async move {
                                run_backfill(&rest, &guild_ids, &bot_id, sink.as_ref()).await;
                            });
                        }
                    }
                }

                _ = tick(&mut heartbeat) => {
                    let Some(beat) = self.heartbeat_due() else {
                        return Ok(Reconnect::Now);
                    };
                    send(&mut writer, &beat).await?;
                }
            }
        }
    }

    /// Next periodic heartbeat, or `None` when the previous one was never acknowledged and the
    /// connection should be dropped and resumed
    pub fn heartbeat_due(&mut self) -> Option<GatewayPayload> {
        if !self.session.heartbeat_acked {
            tracing::warn!("no heartbeat ack since last beat, connection is stale");
            return None;
        }

        self.session.heartbeat_acked = false;
        Some(heartbeat_payload(self.session.sequence))
    }

    /// Updates session state from one gateway payload and forwards mentions of the bot to the
    /// sink. Socket I/O is left to the caller through the returned action.
    #[instrument(skip(self, payload), fields(op = payload.op, event = ?payload.t))]
    pub async fn handle_payload(
        &mut self,
        payload: GatewayPayload,
    ) -> GatewayResult<GatewayAction> {
        if let Some(sequence) = payload.s {
            self.session.sequence = Some(sequence);
        }

        let op = match Opcode::try_from(payload.op) {
            Ok(op) => op,
            Err(unknown) => {
                tracing::debug!(op = unknown, "ignoring unknown gateway opcode");
                return Ok(GatewayAction::None);
            }
        };

        let action = match op {
            Opcode::Hello => {
                let hello: Hello = serde_json::from_value(payload.d)?;
                self.session.heartbeat_acked = true;

                GatewayAction::Handshake(
                    Duration::from_millis(hello.heartbeat_interval),
                    self.handshake_payload(),
                )
            }
            Opcode::Heartbeat => GatewayAction::Heartbeat,
            Opcode::HeartbeatAck => {
                tracing::trace!("heartbeat ack");
                self.session.heartbeat_acked = true;
                GatewayAction::None
            }
            Opcode::Reconnect => {
                tracing::warn!("gateway requested reconnect");
                GatewayAction::Reconnect(Reconnect::Now)
            }
            Opcode::InvalidSession => {
                let resumable = payload.d.as_bool().unwrap_or(false);
                tracing::warn!(resumable, "gateway invalidated session");
                if !resumable {
                    self.session.reset();
                }

                GatewayAction::Reconnect(Reconnect::AfterDelay)
            }
            Opcode::Dispatch => {
                self.handle_dispatch(payload.t.as_deref().unwrap_or_default(), payload.d)
                    .await?
            }
            Opcode::Identify | Opcode::Resume => GatewayAction::None,
        };

        Ok(action)
    }

    fn handshake_payload(&self) -> GatewayPayload {
        match (&self.session.session_id, self.session.sequence) {
            (Some(session_id), Some(sequence)) => {
                tracing::info!(%session_id, sequence, "resuming gateway session");
                resume_payload(&self.token, session_id, sequence)
            }
            _ => identify_payload(&self.token),
        }
    }

    async fn handle_dispatch(&mut self, event: &str, data: Value) -> GatewayResult<GatewayAction> {
        match event {
            "READY" => {
                let ready: Ready = serde_json::from_value(data)?;
                tracing::info!(
                    user = %ready.user.username,
                    bot_id = %ready.user.id,
                    guilds = ready.guilds.len(),
                    "bot is connected and ready"
                );

                self.session.bot_id = Some(ready.user.id.clone());
                self.session.session_id = Some(ready.session_id);
                self.session.resume_url = ready.resume_gateway_url;

                // history is only scanned once per process, reconnects would double count
                if self.session.backfilled {
                    return Ok(GatewayAction::None);
                }
                self.session.backfilled = true;

                Ok(GatewayAction::Backfill {
                    guild_ids: ready.guilds.into_iter().map(|g| g.id).collect(),
                    bot_id: ready.user.id,
                })
            }

            "RESUMED" => {
                tracing::info!(sequence = ?self.session.sequence, "gateway session resumed");
                Ok(GatewayAction::None)
            }

            "MESSAGE_CREATE" => {
                let Some(bot_id) = self.session.bot_id.as_deref() else {
                    tracing::warn!("message received before READY, ignoring");
                    return Ok(GatewayAction::None);
                };

                let message: DiscordMessage = serde_json::from_value(data)?;
                if message.mentions_user(bot_id) {
                    let user = message.author.display_name();
                    tracing::debug!(user, channel_id = %message.channel_id, "bot mentioned");
                    self.sink.record_mention(user).await;
                }

                Ok(GatewayAction::None)
            }

            _ => {
                tracing::trace!(event, "unhandled dispatch");
                Ok(GatewayAction::None)
            }
        }
    }
}

async fn send(writer: &mut Writer, payload: &GatewayPayload) -> GatewayResult<()> {
    let text = serde_json::to_string(payload)?;
    writer.send(Message::text(text)).await?;

    Ok(())
}

/// Resolves on the next heartbeat, or never if the gateway has not said Hello yet
async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

pub fn identify_payload(token: &str) -> GatewayPayload {
    GatewayPayload::new(
        Opcode::Identify,
        json!({
            "token": token,
            "intents": GATEWAY_INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": env!("CARGO_PKG_NAME"),
                "device": env!("CARGO_PKG_NAME"),
            },
        }),
    )
}

pub fn resume_payload(token: &str, session_id: &str, sequence: u64) -> GatewayPayload {
    GatewayPayload::new(
        Opcode::Resume,
        json!({
            "token": token,
            "session_id": session_id,
            "seq": sequence,
        }),
    )
}

pub fn heartbeat_payload(sequence: Option<u64>) -> GatewayPayload {
    GatewayPayload::new(Opcode::Heartbeat, json!(sequence))
}

pub type GatewayResult<T> = core::result::Result<T, GatewayErr>;

#[derive(Debug, Error)]
pub enum GatewayErr {
    #[error(transparent)]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Rest(#[from] DiscordErr),
}
