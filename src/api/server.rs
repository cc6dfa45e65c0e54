use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::service::MentionService;

pub const CHART_JS_MISSING: &str = "Chart.js file not found!";

#[derive(Clone, Debug)]
pub struct AppState {
    pub service: Arc<MentionService>,
    pub chart_js_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(service: Arc<MentionService>, chart_js_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            chart_js_path: Arc::new(chart_js_path.into()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/chart.js", get(chart_js))
        .route("/events", get(events))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

/// Logs any `RouteError` a handler attached to its response
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

/// Binds the listener on all interfaces and serves the dashboard in the background. Only a bind
/// failure is returned; errors while serving are logged by the spawned task.
#[instrument(skip(state))]
pub async fn start_server(state: AppState, port: u16) -> RouteResult<JoinHandle<()>> {
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let listener = tokio::net::TcpListener::bind(socket_addr)
        .await
        .map_err(|source| RouteError::Bind {
            addr: socket_addr,
            source,
        })?;

    tracing::info!(
        server_url = &format!("http://localhost:{}", port),
        "server running"
    );

    let app = router(state);
    Ok(tokio::task::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = ?e, "http server stopped");
        }
    }))
}

pub type RouteResult<T> = core::result::Result<T, RouteError>;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to read chart script at '{path}': {source}")]
    AssetMissing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let mut response = match &self {
            // status stays 200, only the body reports the missing script
            RouteError::AssetMissing { .. } => (
                StatusCode::OK,
                [(CONTENT_TYPE, "application/javascript")],
                CHART_JS_MISSING,
            )
                .into_response(),

            RouteError::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        };

        response.extensions_mut().insert(Arc::new(self));
        response
    }
}
