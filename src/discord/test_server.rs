//! Stand-in for the Discord REST API, served on an ephemeral local port.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-token";
pub const BOT_ID: &str = "99";

/// Serves the mock routes on an ephemeral loopback port and returns the bound address
pub async fn spawn() -> SocketAddr {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router()).await.unwrap();
    });

    addr
}

fn router() -> Router {
    Router::new()
        .route("/guilds/{id}/channels", get(guild_channels))
        .route("/channels/{id}/messages", get(channel_messages))
}

fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == format!("Bot {TOKEN}") => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "401: Unauthorized", 0)),
    }
}

fn error(status: StatusCode, message: &str, code: u32) -> Response {
    (status, Json(json!({ "message": message, "code": code }))).into_response()
}

async fn guild_channels(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(res) = authorized(&headers) {
        return res;
    }

    match id.as_str() {
        "g1" => Json(json!([
            { "id": "c1", "type": 0, "name": "general" },
            { "id": "v1", "type": 2, "name": "voice" },
            { "id": "forbidden", "type": 0, "name": "mods-only" },
        ]))
        .into_response(),
        "g2" => Json(json!([{ "id": "c2", "type": 0, "name": "memes" }])).into_response(),
        _ => error(StatusCode::NOT_FOUND, "Unknown Guild", 10004),
    }
}

async fn channel_messages(
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(res) = authorized(&headers) {
        return res;
    }

    if query.get("limit").map(String::as_str) != Some("100") {
        return error(StatusCode::BAD_REQUEST, "Invalid Form Body", 50035);
    }

    match id.as_str() {
        "c1" => Json(json!([
            message("1", "c1", user("2", "alice", None), &[bot()]),
            message("2", "c1", user("3", "bob", None), &[]),
            message("3", "c1", user("2", "alice", None), &[user("3", "bob", None), bot()]),
            message("4", "c1", user("4", "carol_x", Some("Carol")), &[bot()]),
        ]))
        .into_response(),
        "c2" => Json(json!([message("5", "c2", user("3", "bob", None), &[bot()])])).into_response(),
        "v1" => error(StatusCode::INTERNAL_SERVER_ERROR, "voice channel fetched", 0),
        "forbidden" => error(StatusCode::FORBIDDEN, "Missing Access", 50001),
        _ => error(StatusCode::NOT_FOUND, "Unknown Channel", 10003),
    }
}

fn bot() -> Value {
    json!({ "id": BOT_ID, "username": "board", "bot": true })
}

fn user(id: &str, username: &str, global_name: Option<&str>) -> Value {
    json!({ "id": id, "username": username, "global_name": global_name })
}

fn message(id: &str, channel_id: &str, author: Value, mentions: &[Value]) -> Value {
    json!({
        "id": id,
        "channel_id": channel_id,
        "author": author,
        "mentions": mentions,
        "content": "",
    })
}
