//! Read-only ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketdesk_core::{Messenger, Ticket, TicketFilter, TicketId, TicketStatus};

use super::error::ApiError;
use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    pub status: Option<TicketStatus>,
    pub messenger: Option<Messenger>,
    pub category: Option<String>,
    /// Maximum number of tickets to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Ticket as shown by the API
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
    /// Wire token staff see in the chat
    pub reference: String,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn respond(state: &AppState, ticket: Ticket) -> TicketResponse {
    TicketResponse {
        reference: state.engine().codec().reference(ticket.ticket_id),
        ticket,
    }
}

/// List tickets
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TicketFilter::new();
    if let Some(status) = params.status {
        filter = filter.with_status(status);
    }
    if let Some(messenger) = params.messenger {
        filter = filter.with_messenger(messenger);
    }
    if let Some(category) = params.category {
        filter = filter.with_category(category);
    }

    let total = state.ticket_store().count(&filter)?;
    let tickets = state
        .ticket_store()
        .list(&filter.with_limit(limit).with_offset(offset))?
        .into_iter()
        .map(|ticket| respond(&state, ticket))
        .collect();

    Ok(Json(ListTicketsResponse {
        tickets,
        total,
        limit,
        offset,
    }))
}

/// Get a single ticket by id
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket = state.engine().find_by_id(TicketId(id), None).await?;
    Ok(Json(respond(&state, ticket)))
}
