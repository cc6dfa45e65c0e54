use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame exchanged over the gateway socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    pub fn new(op: Opcode, d: Value) -> Self {
        Self {
            op: op.into(),
            d,
            s: None,
            t: None,
        }
    }
}

/// Gateway opcodes this client sends or reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Dispatch,
    Heartbeat,
    Identify,
    Resume,
    Reconnect,
    InvalidSession,
    Hello,
    HeartbeatAck,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Dispatch),
            1 => Ok(Self::Heartbeat),
            2 => Ok(Self::Identify),
            6 => Ok(Self::Resume),
            7 => Ok(Self::Reconnect),
            9 => Ok(Self::InvalidSession),
            10 => Ok(Self::Hello),
            11 => Ok(Self::HeartbeatAck),
            other => Err(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Dispatch => 0,
            Opcode::Heartbeat => 1,
            Opcode::Identify => 2,
            Opcode::Resume => 6,
            Opcode::Reconnect => 7,
            Opcode::InvalidSession => 9,
            Opcode::Hello => 10,
            Opcode::HeartbeatAck => 11,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    /// Milliseconds
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub user: DiscordUser,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub session_id: String,
    /// Host to reconnect to when resuming this session
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnavailableGuild {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl DiscordUser {
    /// Global display name if the user set one, otherwise their username
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    pub author: DiscordUser,
    #[serde(default)]
    pub mentions: Vec<DiscordUser>,
    #[serde(default)]
    pub content: String,
}

impl DiscordMessage {
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|user| user.id == user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// Channel type; `0` is a guild text channel
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mentions_user() {
        let msg: DiscordMessage = serde_json::from_value(json!({
            "id": "1",
            "channel_id": "10",
            "author": { "id": "2", "username": "alice" },
            "mentions": [{ "id": "99", "username": "board", "bot": true }],
            "content": "<@99> hi"
        }))
        .unwrap();

        assert!(msg.mentions_user("99"));
        assert!(!msg.mentions_user("2"));
    }

    #[test]
    fn test_display_name_prefers_global_name() {
        let named: DiscordUser = serde_json::from_value(json!({
            "id": "2", "username": "alice_01", "global_name": "Alice"
        }))
        .unwrap();
        let unnamed: DiscordUser = serde_json::from_value(json!({
            "id": "3", "username": "bob", "global_name": null
        }))
        .unwrap();

        assert_eq!(named.display_name(), "Alice");
        assert_eq!(unnamed.display_name(), "bob");
    }

    #[test]
    fn test_opcode_conversion() {
        assert_eq!(Opcode::try_from(10), Ok(Opcode::Hello));
        assert_eq!(Opcode::try_from(3), Err(3));
        assert_eq!(u8::from(Opcode::Identify), 2);
        assert_eq!(Opcode::try_from(6), Ok(Opcode::Resume));
    }
}
