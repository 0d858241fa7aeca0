//! Audit trail queries.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketdesk_core::{AuditFilter, AuditRecord, TicketId, UserKey};

use super::error::ApiError;
use crate::state::AppState;

/// Maximum allowed limit for audit queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for audit queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for `GET /audit`
#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub ticket_id: Option<i64>,
    /// End user as `MESSENGER:raw_id`
    pub user: Option<String>,
    /// One event type, or several separated by commas
    pub event_type: Option<String>,
    /// ISO 8601 lower bound
    pub from: Option<DateTime<Utc>>,
    /// ISO 8601 upper bound
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A page of audit records plus the unpaged total
#[derive(Debug, Serialize)]
pub struct AuditQueryResponse {
    pub events: Vec<AuditRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl AuditQueryParams {
    fn filter(&self) -> Result<AuditFilter, ApiError> {
        let mut filter = AuditFilter::new().between(self.from, self.to);

        if let Some(id) = self.ticket_id {
            filter.ticket = Some(TicketId(id));
        }
        if let Some(ref user) = self.user {
            let user = UserKey::from_storage_key(user).ok_or_else(|| {
                ApiError::bad_request(format!("user must look like WEB:42, got {:?}", user))
            })?;
            filter = filter.with_user(user);
        }
        for event_type in self
            .event_type
            .iter()
            .flat_map(|types| types.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            filter = filter.with_event_type(event_type);
        }

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        Ok(filter.page(limit, offset))
    }
}

fn page(state: &AppState, filter: AuditFilter) -> Result<AuditQueryResponse, ApiError> {
    let events = state.audit_store().query(&filter)?;
    let total = state.audit_store().count(&filter)?;
    Ok(AuditQueryResponse {
        events,
        total,
        limit: filter.limit,
        offset: filter.offset,
    })
}

/// Query audit events, newest first
pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditQueryResponse>, ApiError> {
    Ok(Json(page(&state, params.filter()?)?))
}

/// Everything recorded about one ticket, oldest first
pub async fn ticket_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<AuditQueryResponse>, ApiError> {
    let ticket = state.engine().find_by_id(TicketId(id), None).await?;

    let filter = AuditFilter::for_ticket(ticket.ticket_id).page(MAX_LIMIT, 0);
    let mut response = page(&state, filter)?;
    response.events.reverse();
    Ok(Json(response))
}
