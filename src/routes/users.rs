use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{self, AuditObject, AuditType};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User};
use crate::schema::users;
use crate::state::AppState;
use crate::utils::json::{resource_payload, updated_by};

use super::to_iso;

pub(crate) const OBJECT_TYPE: &str = "users";

const ROLES: &[&str] = &["buyer", "supplier", "applicant", "admin"];

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user_payload = resource_payload(&payload, "users")?;
    let actor = updated_by(&payload)?;

    let email_address = required_trimmed(user_payload, "emailAddress")?.to_lowercase();
    let name = required_trimmed(user_payload, "name")?;
    let role = required_trimmed(user_payload, "role")?;
    ensure_known_role(&role)?;

    let application_id = optional_uuid(user_payload, "applicationId")?;

    let mut conn = state.db()?;
    let user_id = Uuid::new_v4();
    let user: User = conn.transaction::<_, AppError, _>(|conn| {
        diesel::insert_into(users::table)
            .values(&NewUser {
                id: user_id,
                email_address: email_address.clone(),
                name: name.clone(),
                role: role.clone(),
                supplier_id: None,
                application_id,
            })
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::CreateUser,
            &actor,
            json!({"userId": user_id, "userJson": {"emailAddress": email_address, "name": name, "role": role}}),
            Some(AuditObject::new(OBJECT_TYPE, user_id)),
        )?;

        Ok(users::table.find(user_id).first(conn)?)
    })?;

    let body = serialize_user(&state.config.base_url, &user);
    Ok((StatusCode::CREATED, Json(json!({"users": body}))))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("User '{user_id}' does not exist")))?;

    Ok(Json(json!({"users": serialize_user(&state.config.base_url, &user)})))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let user_payload = resource_payload(&payload, "users")?.clone();
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("User '{user_id}' does not exist")))?;

    let name = match user_payload.get("name").and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => value.trim().to_owned(),
        Some(_) => return Err(AppError::bad_request("Invalid JSON must have 'name' value")),
        None => user.name.clone(),
    };
    let role = match user_payload.get("role").and_then(Value::as_str) {
        Some(value) => {
            ensure_known_role(value)?;
            value.to_owned()
        }
        None => user.role.clone(),
    };
    let application_id = match user_payload.get("applicationId") {
        Some(Value::Null) => None,
        Some(value) => value
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(Some)
            .ok_or_else(|| AppError::bad_request("Invalid 'applicationId' value"))?,
        None => user.application_id,
    };

    let now = Utc::now().naive_utc();
    let updated: User = conn.transaction::<_, AppError, _>(|conn| {
        diesel::update(users::table.find(user.id))
            .set((
                users::name.eq(&name),
                users::role.eq(&role),
                users::application_id.eq(application_id),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::UpdateUser,
            &actor,
            json!({"userId": user.id, "userJson": user_payload}),
            Some(AuditObject::new(OBJECT_TYPE, user.id)),
        )?;

        Ok(users::table.find(user.id).first(conn)?)
    })?;

    Ok(Json(json!({"users": serialize_user(&state.config.base_url, &updated)})))
}

fn required_trimmed(payload: &serde_json::Map<String, Value>, key: &str) -> AppResult<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AppError::bad_request(format!("Invalid JSON must have '{key}' key")))
}

fn optional_uuid(payload: &serde_json::Map<String, Value>, key: &str) -> AppResult<Option<Uuid>> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(Some)
            .ok_or_else(|| AppError::bad_request(format!("Invalid '{key}' value"))),
    }
}

fn ensure_known_role(role: &str) -> AppResult<()> {
    if ROLES.contains(&role) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("Invalid user role '{role}'")))
    }
}

/// The serialized user never includes credentials or other private state,
/// only the marketplace-facing fields.
fn serialize_user(base_url: &str, user: &User) -> Value {
    let mut body = json!({
        "id": user.id,
        "emailAddress": user.email_address,
        "name": user.name,
        "role": user.role,
        "createdAt": to_iso(user.created_at),
        "updatedAt": to_iso(user.updated_at),
        "links": {
            "self": format!("{base_url}/users/{}", user.id),
        },
    });
    if let Some(supplier_id) = user.supplier_id {
        body["supplierId"] = json!(supplier_id);
        body["links"]["supplier"] = json!(format!("{base_url}/suppliers/{supplier_id}"));
    }
    if let Some(application_id) = user.application_id {
        body["applicationId"] = json!(application_id);
        body["links"]["application"] = json!(format!("{base_url}/applications/{application_id}"));
    }
    body
}
