use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{self, AuditObject, AuditType};
use crate::briefs::BriefStatus;
use crate::error::{AppError, AppResult};
use crate::models::{Brief, BriefResponse, NewBriefResponse, Supplier};
use crate::schema::{brief_responses, briefs, suppliers};
use crate::state::AppState;
use crate::utils::json::{clean_data, resource_payload, updated_by, uuid_field};

use super::to_iso;

pub(crate) const OBJECT_TYPE: &str = "brief_responses";

/// Foreign and computed keys a supplier cannot write through the data blob.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "briefId",
    "supplierId",
    "supplierCode",
    "supplierName",
    "createdAt",
    "updatedAt",
    "submittedAt",
    "withdrawnAt",
    "links",
];

pub async fn create_brief_response(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let response_payload = resource_payload(&payload, "briefResponses")?.clone();
    let actor = updated_by(&payload)?;

    let brief_id = uuid_field(&response_payload, "briefId")?;
    let supplier_id = uuid_field(&response_payload, "supplierId")?;

    let mut conn = state.db()?;

    let brief: Brief = briefs::table
        .find(brief_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request(format!("Invalid brief ID '{brief_id}'")))?;
    let supplier: Supplier = suppliers::table
        .find(supplier_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request(format!("Invalid supplier ID '{supplier_id}'")))?;

    let now = Utc::now().naive_utc();
    if brief.status(now) != BriefStatus::Live {
        return Err(AppError::invalid_state("Brief must be live"));
    }

    let cleaned = clean_data(&response_payload, RESERVED_KEYS);

    let response_id = Uuid::new_v4();
    let response: BriefResponse = conn.transaction::<_, AppError, _>(|conn| {
        diesel::insert_into(brief_responses::table)
            .values(&NewBriefResponse {
                id: response_id,
                brief_id: brief.id,
                supplier_id: supplier.id,
                data: Value::Object(cleaned.clone()),
            })
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::CreateBriefResponse,
            &actor,
            json!({"briefResponseId": response_id, "briefResponseJson": cleaned}),
            Some(AuditObject::new(OBJECT_TYPE, response_id)),
        )?;

        Ok(brief_responses::table.find(response_id).first(conn)?)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "briefResponses": serialize_brief_response(&state.config.base_url, &response, &supplier)
        })),
    ))
}

pub async fn get_brief_response(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    let (response, supplier) = load_brief_response(&mut conn, response_id)?;

    Ok(Json(json!({
        "briefResponses": serialize_brief_response(&state.config.base_url, &response, &supplier)
    })))
}

pub async fn update_brief_response(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let response_payload = resource_payload(&payload, "briefResponses")?.clone();
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (response, supplier) = load_brief_response(&mut conn, response_id)?;

    let delta = clean_data(&response_payload, RESERVED_KEYS);
    let mut merged = response.data.as_object().cloned().unwrap_or_default();
    for (key, value) in &delta {
        merged.insert(key.clone(), value.clone());
    }

    let now = Utc::now().naive_utc();
    let updated: BriefResponse = conn.transaction::<_, AppError, _>(|conn| {
        diesel::update(brief_responses::table.find(response.id))
            .set((
                brief_responses::data.eq(Value::Object(merged)),
                brief_responses::updated_at.eq(now),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::UpdateBriefResponse,
            &actor,
            json!({"briefResponseId": response.id, "briefResponseJson": delta}),
            Some(AuditObject::new(OBJECT_TYPE, response.id)),
        )?;

        Ok(brief_responses::table.find(response.id).first(conn)?)
    })?;

    Ok(Json(json!({
        "briefResponses": serialize_brief_response(&state.config.base_url, &updated, &supplier)
    })))
}

pub async fn submit_brief_response(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (response, supplier) = load_brief_response(&mut conn, response_id)?;

    if response.withdrawn_at.is_some() {
        return Err(AppError::invalid_state("Brief response has been withdrawn"));
    }
    if response.submitted_at.is_some() {
        return Err(AppError::invalid_state("Brief response is already submitted"));
    }

    let now = Utc::now().naive_utc();
    let updated: BriefResponse = conn.transaction::<_, AppError, _>(|conn| {
        diesel::update(brief_responses::table.find(response.id))
            .set((
                brief_responses::submitted_at.eq(Some(now)),
                brief_responses::updated_at.eq(now),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::UpdateBriefResponse,
            &actor,
            json!({"briefResponseId": response.id, "submittedAt": to_iso(now)}),
            Some(AuditObject::new(OBJECT_TYPE, response.id)),
        )?;

        Ok(brief_responses::table.find(response.id).first(conn)?)
    })?;

    Ok(Json(json!({
        "briefResponses": serialize_brief_response(&state.config.base_url, &updated, &supplier)
    })))
}

pub async fn withdraw_brief_response(
    State(state): State<AppState>,
    Path(response_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (response, supplier) = load_brief_response(&mut conn, response_id)?;

    if response.submitted_at.is_none() {
        return Err(AppError::invalid_state(
            "Cannot withdraw a brief response that has not been submitted",
        ));
    }
    if response.withdrawn_at.is_some() {
        return Err(AppError::invalid_state("Brief response has been withdrawn"));
    }

    let now = Utc::now().naive_utc();
    let updated: BriefResponse = conn.transaction::<_, AppError, _>(|conn| {
        diesel::update(brief_responses::table.find(response.id))
            .set((
                brief_responses::withdrawn_at.eq(Some(now)),
                brief_responses::updated_at.eq(now),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::UpdateBriefResponse,
            &actor,
            json!({"briefResponseId": response.id, "withdrawnAt": to_iso(now)}),
            Some(AuditObject::new(OBJECT_TYPE, response.id)),
        )?;

        Ok(brief_responses::table.find(response.id).first(conn)?)
    })?;

    Ok(Json(json!({
        "briefResponses": serialize_brief_response(&state.config.base_url, &updated, &supplier)
    })))
}

fn load_brief_response(
    conn: &mut PgConnection,
    response_id: Uuid,
) -> AppResult<(BriefResponse, Supplier)> {
    let response: BriefResponse = brief_responses::table
        .find(response_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            AppError::not_found(format!("Brief response '{response_id}' does not exist"))
        })?;
    let supplier: Supplier = suppliers::table.find(response.supplier_id).first(conn)?;
    Ok((response, supplier))
}

pub(crate) fn serialize_brief_response(
    base_url: &str,
    response: &BriefResponse,
    supplier: &Supplier,
) -> Value {
    let mut body = response.data.as_object().cloned().unwrap_or_default();

    body.insert("id".into(), json!(response.id));
    body.insert("briefId".into(), json!(response.brief_id));
    body.insert("supplierId".into(), json!(response.supplier_id));
    body.insert("supplierName".into(), json!(supplier.name));
    body.insert("createdAt".into(), json!(to_iso(response.created_at)));
    body.insert("updatedAt".into(), json!(to_iso(response.updated_at)));
    if let Some(submitted_at) = response.submitted_at {
        body.insert("submittedAt".into(), json!(to_iso(submitted_at)));
    }
    if let Some(withdrawn_at) = response.withdrawn_at {
        body.insert("withdrawnAt".into(), json!(to_iso(withdrawn_at)));
    }
    body.insert(
        "links".into(),
        json!({
            "self": format!("{base_url}/brief-responses/{}", response.id),
            "brief": format!("{base_url}/briefs/{}", response.brief_id),
            "supplier": format!("{base_url}/suppliers/{}", response.supplier_id),
        }),
    );

    Value::Object(body)
}
