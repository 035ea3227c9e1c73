use crate::AppState;
use crate::error::AppError;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use emberwatch_db::TrackedStatus;
use serde::Serialize;
use std::sync::Arc;

/// Read-only view of one tracked status. Discord snowflakes are serialized
/// as strings because they overflow a double if a JS consumer parses them
/// as numbers.
#[derive(Serialize)]
pub(crate) struct StatusSummary {
    id: i64,
    server_id: String,
    server_name: String,
    server_version: String,
    channel_id: String,
    message_id: Option<String>,
    last_refreshed_at: i64,
}

impl From<TrackedStatus> for StatusSummary {
    fn from(status: TrackedStatus) -> Self {
        Self {
            id: status.id,
            server_id: status.server_id,
            server_name: status.server_name,
            server_version: status.server_version,
            channel_id: status.channel_id.to_string(),
            message_id: status.message_id.map(|id| id.to_string()),
            last_refreshed_at: status.last_refreshed_at,
        }
    }
}

pub(crate) async fn statuses(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let tracked = state.db.list_tracked().await?;
    let summaries: Vec<StatusSummary> = tracked.into_iter().map(StatusSummary::from).collect();

    Ok((StatusCode::OK, Json(summaries)))
}
