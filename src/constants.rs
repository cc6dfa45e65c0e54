pub const DISCORD_API_URL: &str = "https://discord.com/api/v10";
pub const GATEWAY_QUERY: &str = "?v=10&encoding=json";
pub const DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

// GUILDS | GUILD_MESSAGES
pub const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 9);
pub const GATEWAY_RECONNECT_DELAY_SECS: u64 = 5;

/// Invalid seq (4007) and session timed out (4009): the session cannot be resumed
pub const SESSION_ENDING_CLOSE_CODES: [u16; 2] = [4007, 4009];

/// Discord caps a single history page at 100 messages
pub const BACKFILL_MESSAGE_LIMIT: usize = 100;
pub const BACKFILL_CONCURRENCY: usize = 8;

/// `type` value of a guild text channel
pub const GUILD_TEXT_CHANNEL: u8 = 0;

pub const LEADERBOARD_SIZE: usize = 10;

pub const DEFAULT_PORT: &str = "8080";
pub const DEFAULT_DATA_FILE: &str = "mentionCounts.json";
pub const DEFAULT_CHART_JS_PATH: &str = "node_modules/chart.js/dist/chart.umd.js";

pub const SERVICE_NAME: &str = "mention-board";
pub const TRACER_NAME: &str = "mention-board-tracer";
