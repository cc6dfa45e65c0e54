use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use futures::Stream;
use futures::stream;
use http::StatusCode;
use http::header::{CONNECTION, CONTENT_TYPE};
use tracing::instrument;

use crate::api::broadcast::Subscription;
use crate::api::server::{AppState, RouteError, RouteResult};

const DASHBOARD: &str = include_str!("dashboard.html");

pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD)
}

#[instrument(skip(state), fields(path = %state.chart_js_path.display()))]
pub async fn chart_js(State(state): State<AppState>) -> RouteResult<Response> {
    let path = state.chart_js_path.as_ref();
    let script = tokio::fs::read(path)
        .await
        .map_err(|source| RouteError::AssetMissing {
            path: path.clone(),
            source,
        })?;

    Ok(([(CONTENT_TYPE, "application/javascript")], script).into_response())
}

/// Live leaderboard feed. The current board is sent immediately, then one event per change
/// until the viewer disconnects.
#[instrument(skip(state))]
pub async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let subscription = state.service.subscribe().await;
    tracing::info!(
        id = %subscription.id(),
        viewers = state.service.hub().len(),
        "live feed viewer connected"
    );

    ([(CONNECTION, "keep-alive")], Sse::new(frames(subscription)))
}

/// Turns a hub subscription into SSE events; dropping the stream unsubscribes
fn frames(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let frame = subscription.recv().await?;
        Some((Ok(Event::default().data(&*frame)), subscription))
    })
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(CONTENT_TYPE, "text/plain")],
        "404 Not Found",
    )
}
