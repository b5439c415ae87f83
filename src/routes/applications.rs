use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::{prelude::*, PgConnection};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::applications as lifecycle;
use crate::applications::ApplicationStatus;
use crate::audit::{self, AuditObject, AuditType};
use crate::error::{AppError, AppResult};
use crate::models::{Application, NewApplication, Supplier, User};
use crate::notify;
use crate::schema::{applications, suppliers, users};
use crate::state::AppState;
use crate::utils::json::{clean_data, resource_payload, updated_by, uuid_field};

use super::briefs::PageQuery;
use super::{pagination_links, to_iso};

pub(crate) const OBJECT_TYPE: &str = "applications";

pub async fn create_application(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let application_payload = resource_payload(&payload, "application")?.clone();
    let actor = optional_updated_by(&payload);

    let cleaned = clean_data(&application_payload, lifecycle::RESERVED_KEYS);

    let mut conn = state.db()?;
    let application_id = Uuid::new_v4();
    let application: Application = conn.transaction::<_, AppError, _>(|conn| {
        diesel::insert_into(applications::table)
            .values(&NewApplication {
                id: application_id,
                data: Value::Object(cleaned.clone()),
                status: ApplicationStatus::Saved.as_str().to_owned(),
            })
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::CreateApplication,
            &actor,
            json!({"applicationId": application_id, "applicationJson": cleaned}),
            Some(AuditObject::new(OBJECT_TYPE, application_id)),
        )?;

        Ok(applications::table.find(application_id).first(conn)?)
    })?;

    let body = serialize_application(&state.config.base_url, &application, None);
    Ok((StatusCode::CREATED, Json(json!({"application": body}))))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    let (application, supplier) = load_application(&mut conn, application_id)?;

    let body = serialize_application(&state.config.base_url, &application, supplier.as_ref());
    Ok(Json(json!({"application": body})))
}

pub async fn list_applications(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Value>> {
    if query.page < 1 {
        return Err(AppError::bad_request("Invalid page argument"));
    }
    let per_page = state.config.page_size;
    let mut conn = state.db()?;

    let total: i64 = applications::table
        .filter(applications::status.ne(ApplicationStatus::Deleted.as_str()))
        .count()
        .get_result(&mut conn)?;
    let rows: Vec<Application> = applications::table
        .filter(applications::status.ne(ApplicationStatus::Deleted.as_str()))
        .order(applications::created_at.desc())
        .limit(per_page)
        .offset((query.page - 1) * per_page)
        .load(&mut conn)?;

    let serialized: Vec<Value> = rows
        .iter()
        .map(|application| serialize_application(&state.config.base_url, application, None))
        .collect();

    Ok(Json(json!({
        "applications": serialized,
        "links": pagination_links(&state.config.base_url, "/applications", query.page, total, per_page),
    })))
}

/// Data-merge update. A payload that moves a submitted application back to
/// `saved` is a revert and gets its own audit event before the status
/// assignment.
pub async fn update_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let application_payload = resource_payload(&payload, "application")?.clone();
    let actor = optional_updated_by(&payload);

    let mut conn = state.db()?;
    let (application, _) = load_application(&mut conn, application_id)?;

    let requests_saved = application_payload.get("status").and_then(Value::as_str)
        == Some(ApplicationStatus::Saved.as_str());
    let is_revert = requests_saved
        && application.lifecycle_status()? == ApplicationStatus::Submitted;

    let delta = clean_data(&application_payload, lifecycle::RESERVED_KEYS);
    let mut merged = application.data.as_object().cloned().unwrap_or_default();
    for (key, value) in &delta {
        merged.insert(key.clone(), value.clone());
    }

    let now = Utc::now().naive_utc();
    let updated: Application = conn.transaction::<_, AppError, _>(|conn| {
        let application = if is_revert {
            audit::record(
                conn,
                AuditType::RevertApplication,
                &actor,
                json!({"applicationId": application.id}),
                Some(AuditObject::new(OBJECT_TYPE, application.id)),
            )?;
            lifecycle::revert_to_saved(conn, &application, now)?
        } else {
            application
        };

        diesel::update(applications::table.find(application.id))
            .set((
                applications::data.eq(Value::Object(merged)),
                applications::updated_at.eq(now),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::UpdateApplication,
            &actor,
            json!({"applicationId": application.id, "applicationJson": delta}),
            Some(AuditObject::new(OBJECT_TYPE, application.id)),
        )?;

        Ok(applications::table.find(application.id).first(conn)?)
    })?;

    let supplier = load_supplier(&mut conn, updated.supplier_id)?;
    let body = serialize_application(&state.config.base_url, &updated, supplier.as_ref());
    Ok(Json(json!({"application": body})))
}

pub async fn submit_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let submit_payload = payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Invalid JSON payload"))?;
    let user_id = uuid_field(submit_payload, "user_id")?;

    let mut conn = state.db()?;
    let (application, _) = load_application(&mut conn, application_id)?;

    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("User ID does not exist"))?;
    if user.application_id != Some(application.id) {
        return Err(AppError::bad_request(
            "User is not authorized to submit application",
        ));
    }

    let now = Utc::now().naive_utc();
    let updated: Application = conn.transaction::<_, AppError, _>(|conn| {
        audit::record(
            conn,
            AuditType::SubmitApplication,
            &user.id.to_string(),
            json!({"applicationId": application.id}),
            Some(AuditObject::new(OBJECT_TYPE, application.id)),
        )?;

        let submitted = lifecycle::submit_for_approval(conn, &application, now)?;

        let mut data = submitted.data.as_object().cloned().unwrap_or_default();
        data.insert("submitted_at".into(), json!(to_iso(now)));
        diesel::update(applications::table.find(submitted.id))
            .set(applications::data.eq(Value::Object(data)))
            .execute(conn)?;

        Ok(applications::table.find(submitted.id).first(conn)?)
    })?;

    notify::try_send(
        state.notifier.as_ref(),
        &[user.email_address.clone()],
        "Application submitted",
        "Your application has been submitted for approval.",
    )
    .await;

    let body = serialize_application(&state.config.base_url, &updated, None);
    Ok(Json(json!({"application": body})))
}

pub async fn approve_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    application_approval(state, application_id, payload, true).await
}

pub async fn reject_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    application_approval(state, application_id, payload, false).await
}

async fn application_approval(
    state: AppState,
    application_id: Uuid,
    payload: Value,
    approved: bool,
) -> AppResult<Json<Value>> {
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (application, _) = load_application(&mut conn, application_id)?;

    let now = Utc::now().naive_utc();
    let (updated, supplier) = conn.transaction::<_, AppError, _>(|conn| {
        audit::record(
            conn,
            if approved {
                AuditType::ApproveApplication
            } else {
                AuditType::RejectApplication
            },
            &actor,
            json!({"applicationId": application.id}),
            Some(AuditObject::new(OBJECT_TYPE, application.id)),
        )?;

        lifecycle::set_approval(conn, &application, approved, now)
    })?;

    if approved {
        let recipients = owning_user_emails(&mut conn, updated.id)?;
        notify::try_send(
            state.notifier.as_ref(),
            &recipients,
            "Application approved",
            "Your application has been approved and your seller account is ready.",
        )
        .await;
    }

    let body = serialize_application(&state.config.base_url, &updated, supplier.as_ref());
    Ok(Json(json!({"application": body})))
}

pub async fn revert_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let actor = updated_by(&payload)?;
    // An empty or whitespace-only message means "revert but do not email".
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned);

    let mut conn = state.db()?;
    let (application, _) = load_application(&mut conn, application_id)?;

    let now = Utc::now().naive_utc();
    let updated: Application = conn.transaction::<_, AppError, _>(|conn| {
        audit::record(
            conn,
            AuditType::RevertApplication,
            &actor,
            json!({"applicationId": application.id}),
            Some(AuditObject::new(OBJECT_TYPE, application.id)),
        )?;

        lifecycle::revert_to_saved(conn, &application, now)
    })?;

    if let Some(message) = message {
        let recipients = owning_user_emails(&mut conn, updated.id)?;
        notify::try_send(
            state.notifier.as_ref(),
            &recipients,
            "Application reverted",
            &message,
        )
        .await;
    }

    let body = serialize_application(&state.config.base_url, &updated, None);
    Ok(Json(json!({"application": body})))
}

pub async fn unreject_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (application, _) = load_application(&mut conn, application_id)?;

    let now = Utc::now().naive_utc();
    let updated: Application = conn.transaction::<_, AppError, _>(|conn| {
        audit::record(
            conn,
            AuditType::UnrejectApplication,
            &actor,
            json!({"applicationId": application.id}),
            Some(AuditObject::new(OBJECT_TYPE, application.id)),
        )?;

        lifecycle::unreject_approval(conn, &application, now)
    })?;

    let body = serialize_application(&state.config.base_url, &updated, None);
    Ok(Json(json!({"application": body})))
}

pub async fn assess_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let assessment = resource_payload(&payload, "assessment")?;
    let actor = updated_by(&payload)?;
    let successful = assessment
        .get("successful")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            AppError::bad_request("Invalid JSON must have 'assessment.successful' key")
        })?;

    let mut conn = state.db()?;
    let (application, _) = load_application(&mut conn, application_id)?;

    let now = Utc::now().naive_utc();
    let (updated, supplier) = conn.transaction::<_, AppError, _>(|conn| {
        audit::record(
            conn,
            AuditType::AssessApplication,
            &actor,
            json!({"applicationId": application.id, "successful": successful}),
            Some(AuditObject::new(OBJECT_TYPE, application.id)),
        )?;

        lifecycle::set_assessment_result(conn, &application, successful, now)
    })?;

    let body = serialize_application(&state.config.base_url, &updated, Some(&supplier));
    Ok(Json(json!({"application": body})))
}

pub async fn unassess_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (application, _) = load_application(&mut conn, application_id)?;

    let now = Utc::now().naive_utc();
    let (updated, supplier) = conn.transaction::<_, AppError, _>(|conn| {
        audit::record(
            conn,
            AuditType::UnassessApplication,
            &actor,
            json!({"applicationId": application.id}),
            Some(AuditObject::new(OBJECT_TYPE, application.id)),
        )?;

        lifecycle::unassess(conn, &application, now)
    })?;

    let body = serialize_application(&state.config.base_url, &updated, Some(&supplier));
    Ok(Json(json!({"application": body})))
}

pub async fn delete_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (application, _) = load_application(&mut conn, application_id)?;

    let now = Utc::now().naive_utc();
    conn.transaction::<_, AppError, _>(|conn| {
        audit::record(
            conn,
            AuditType::DeleteApplication,
            &actor,
            json!({"applicationId": application.id}),
            Some(AuditObject::new(OBJECT_TYPE, application.id)),
        )?;

        lifecycle::soft_delete(conn, &application, now)?;
        Ok(())
    })?;

    Ok(Json(json!({"message": "done"})))
}

fn load_application(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> AppResult<(Application, Option<Supplier>)> {
    let application: Application = applications::table
        .find(application_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| {
            AppError::not_found(format!("Application '{application_id}' does not exist"))
        })?;

    if application.status == ApplicationStatus::Deleted.as_str() {
        return Err(AppError::not_found(format!(
            "Application '{application_id}' does not exist"
        )));
    }

    let supplier = load_supplier(conn, application.supplier_id)?;
    Ok((application, supplier))
}

fn load_supplier(
    conn: &mut PgConnection,
    supplier_id: Option<Uuid>,
) -> AppResult<Option<Supplier>> {
    match supplier_id {
        Some(id) => Ok(Some(suppliers::table.find(id).first(conn)?)),
        None => Ok(None),
    }
}

fn owning_user_emails(conn: &mut PgConnection, application_id: Uuid) -> AppResult<Vec<String>> {
    Ok(users::table
        .filter(users::application_id.eq(application_id))
        .select(users::email_address)
        .load(conn)?)
}

fn optional_updated_by(payload: &Value) -> String {
    payload
        .get("update_details")
        .and_then(|details| details.get("updated_by"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

pub(crate) fn serialize_application(
    base_url: &str,
    application: &Application,
    supplier: Option<&Supplier>,
) -> Value {
    let mut body = application.data.as_object().cloned().unwrap_or_default();

    body.insert("id".into(), json!(application.id));
    body.insert("status".into(), json!(application.status));
    body.insert("createdAt".into(), json!(to_iso(application.created_at)));
    body.insert("updatedAt".into(), json!(to_iso(application.updated_at)));

    let mut links = json!({
        "self": format!("{base_url}/applications/{}", application.id),
    });
    if let Some(supplier_id) = application.supplier_id {
        body.insert("supplierId".into(), json!(supplier_id));
        links["supplier"] = json!(format!("{base_url}/suppliers/{supplier_id}"));
    }
    if let Some(supplier) = supplier {
        body.insert("supplierStatus".into(), json!(supplier.status));
    }
    body.insert("links".into(), links);

    Value::Object(body)
}
