//! Inbound end-user messages.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use ticketdesk_core::{Messenger, UserKey, UserMessageOutcome};

use super::error::ApiError;
use crate::state::AppState;

/// A message from an end user, already normalized by the transport.
#[derive(Debug, Deserialize)]
pub struct UserMessageBody {
    pub messenger: Messenger,
    pub user_id: String,
    #[serde(default)]
    pub category: String,
}

/// Route a user message to the user's open ticket, opening one if needed
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UserMessageBody>,
) -> Result<Json<UserMessageOutcome>, ApiError> {
    if body.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id must not be empty"));
    }

    let user = UserKey::new(body.messenger, body.user_id);
    let outcome = state
        .router()
        .handle_user_message(&user, &body.category)
        .await?;
    Ok(Json(outcome))
}
