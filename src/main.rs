use std::num::ParseIntError;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;

use crate::api::broadcast::BroadcastHub;
use crate::api::server::{AppState, RouteError};
use crate::db::prelude::CounterStore;
use crate::discord::gateway::GatewayErr;
use crate::service::MentionService;
use crate::util::env::{EnvErr, Var};
use crate::util::telemetry;

mod api;
mod constants;
mod db;
mod discord;
mod service;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error("invalid PORT: {0}")]
    Port(#[from] ParseIntError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Gateway(#[from] GatewayErr),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let collector_url = var!(Var::OtelExporterEndpoint).await?;
    let telemetry_registry =
        telemetry::Telemetry::new(Some(collector_url).filter(|url| !url.is_empty()))?.register();

    tracing::info!(otlp = telemetry_registry.is_exporting(), "starting mention board");

    let port = var!(Var::Port).await?.parse::<u16>()?;
    let store = CounterStore::load(var!(Var::DataFile).await?).await;
    let service = Arc::new(MentionService::new(store, Arc::new(BroadcastHub::new())));

    let state = AppState::new(Arc::clone(&service), var!(Var::ChartJsPath).await?);

    let handles = vec![
        api::server::start_server(state, port).await?,
        discord::gateway::start_gateway(var!(Var::DiscordToken).await?, Arc::clone(&service))?,
    ];

    tokio::select! {
        _ = join_all(handles) => tracing::warn!("all tasks exited"),
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
    }

    telemetry_registry.shutdown();
    Ok(())
}
