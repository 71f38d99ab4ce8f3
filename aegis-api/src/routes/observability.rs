//! `GET /observability/stream` and `GET /observability/history` (§6, §4.5).
//!
//! SSE rather than WebSocket (see Open Question resolution in DESIGN.md):
//! the bus's subscription contract is a one-way, lazy, potentially-infinite
//! stream of server-pushed events — `axum::response::sse` is the narrowest
//! fit, with no client-to-server messages to justify a full duplex socket.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use aegis_core::ErrorKind;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use aegis_events::SubscriptionFilter;

use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AuthContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub user_id: Option<String>,
    pub agent_slug: Option<String>,
    pub conversation_id: Option<String>,
    pub task_id: Option<String>,
}

async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    _auth: AuthContext,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = SubscriptionFilter {
        user_id: query.user_id,
        agent_slug: query.agent_slug,
        conversation_id: query.conversation_id,
        task_id: query.task_id,
    };
    let events = state.bus.subscribe(filter).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event(event.event_type.clone()).data(data))
    });
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub since: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    100
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
    _auth: AuthContext,
) -> ApiResult<Json<serde_json::Value>> {
    let events = state
        .bus
        .history(query.since, query.until, query.limit)
        .await
        .map_err(|err| ApiError::new(ErrorKind::Internal, err.to_string()))?;
    Ok(Json(serde_json::json!({"events": events})))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/observability/stream", get(stream))
        .route("/observability/history", get(history))
}
