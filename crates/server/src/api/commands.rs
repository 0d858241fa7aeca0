//! Staff commands.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use ticketdesk_core::{CommandReply, StaffCommand, StaffEvent};

use super::error::ApiError;
use crate::state::AppState;

/// Run a staff command (`close`, `reopen`, `ban`, `unban`, `close-all`)
pub async fn run_command(
    State(state): State<Arc<AppState>>,
    Path(command): Path<String>,
    Json(event): Json<StaffEvent>,
) -> Result<Json<CommandReply>, ApiError> {
    let command: StaffCommand = command.parse().map_err(ApiError::bad_request)?;
    let reply = state
        .router()
        .handle_staff_command(command, &event)
        .await?;
    Ok(Json(reply))
}
