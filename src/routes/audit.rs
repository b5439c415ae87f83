use axum::{
    extract::{Query, State},
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::AuditEvent;
use crate::schema::audit_events;
use crate::state::AppState;

use super::{pagination_links, to_iso};

/// Read-only view over the audit trail. There is no write surface here:
/// events are appended by the mutating endpoints and never change.
#[derive(Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub object_type: Option<String>,
    pub object_id: Option<Uuid>,
    pub audit_type: Option<String>,
}

fn default_page() -> i64 {
    1
}

pub async fn list_audit_events(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Value>> {
    if query.page < 1 {
        return Err(AppError::bad_request("Invalid page argument"));
    }
    if let Some(audit_type) = query.audit_type.as_deref() {
        // Reject unknown names instead of silently matching nothing.
        audit_type.parse::<crate::audit::AuditType>()?;
    }

    let per_page = state.config.page_size;
    let mut conn = state.db()?;

    let total: i64 = filtered(&query).count().get_result(&mut conn)?;
    let rows: Vec<AuditEvent> = filtered(&query)
        .order((audit_events::created_at.asc(), audit_events::id.asc()))
        .limit(per_page)
        .offset((query.page - 1) * per_page)
        .load(&mut conn)?;

    let serialized: Vec<Value> = rows.iter().map(serialize_audit_event).collect();

    Ok(Json(json!({
        "auditEvents": serialized,
        "links": pagination_links(&state.config.base_url, "/audit-events", query.page, total, per_page),
    })))
}

type AuditQuerySource = audit_events::BoxedQuery<'static, diesel::pg::Pg>;

fn filtered(query: &AuditQuery) -> AuditQuerySource {
    let mut source = audit_events::table.into_boxed();
    if let Some(object_type) = query.object_type.clone() {
        source = source.filter(audit_events::object_type.eq(object_type));
    }
    if let Some(object_id) = query.object_id {
        source = source.filter(audit_events::object_id.eq(object_id));
    }
    if let Some(audit_type) = query.audit_type.clone() {
        source = source.filter(audit_events::audit_type.eq(audit_type));
    }
    source
}

fn serialize_audit_event(event: &AuditEvent) -> Value {
    json!({
        "id": event.id,
        "type": event.audit_type,
        "user": event.actor,
        "data": event.data,
        "objectType": event.object_type,
        "objectId": event.object_id,
        "createdAt": to_iso(event.created_at),
    })
}
