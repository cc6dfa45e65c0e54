//! Process configuration.
//!
//! Variables are read from the process environment after loading a `.env` file (if one exists)
//! and deserialized into [`Env`] with serde's map deserializer. Every value is kept as a string,
//! with callers parsing anything numeric at the point of use.

use std::sync::LazyLock;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::de::value::MapDeserializer;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::constants::{DEFAULT_CHART_JS_PATH, DEFAULT_DATA_FILE, DEFAULT_PORT};

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = ENV_VARS.get_or_try_init(|| async { Env::new() }).await?;
    Ok(match var {
        Var::DiscordToken => vars.token()?,
        Var::Port => vars.port.as_str(),
        Var::DataFile => vars.data_file.as_str(),
        Var::ChartJsPath => vars.chart_js_path.as_str(),
        Var::OtelExporterEndpoint => vars.otel_exporter_otlp_endpoint.as_str(),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    pub discord_token: Option<String>,
    /// Older spelling of the bot token, used when `DISCORD_TOKEN` is unset
    #[serde(rename = "token")]
    pub legacy_token: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default = "default_chart_js_path")]
    pub chart_js_path: String,
    /// Empty when OTLP export is disabled
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            return Err(e.into());
        }

        let env: Env = from_iter(std::env::vars())?;
        env.token()?;

        Ok(env)
    }

    pub fn token(&self) -> EnvResult<&str> {
        self.discord_token
            .as_deref()
            .or(self.legacy_token.as_deref())
            .ok_or(EnvErr::MissingToken)
    }
}

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

fn default_data_file() -> String {
    DEFAULT_DATA_FILE.to_string()
}

fn default_chart_js_path() -> String {
    DEFAULT_CHART_JS_PATH.to_string()
}

#[derive(Debug)]
pub enum Var {
    DiscordToken,
    Port,
    DataFile,
    ChartJsPath,
    OtelExporterEndpoint,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

pub fn from_iter<Iter, T>(iter: Iter) -> EnvResult<T>
where
    T: DeserializeOwned,
    Iter: IntoIterator<Item = (String, String)>,
{
    let deserializer = MapDeserializer::<_, EnvDeserializeError>::new(iter.into_iter());
    Ok(T::deserialize(deserializer)?)
}

pub type EnvDeserializeError = serde::de::value::Error;
pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error("env deserialization error: {0}")]
    DeserializationError(#[from] EnvDeserializeError),

    #[error("bot token missing: set DISCORD_TOKEN (or token)")]
    MissingToken,
}
