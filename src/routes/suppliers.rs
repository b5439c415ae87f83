use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::{self, AuditObject, AuditType};
use crate::error::{AppError, AppResult};
use crate::models::Supplier;
use crate::schema::suppliers;
use crate::state::AppState;
use crate::utils::json::{clean_data, resource_payload, updated_by};

use super::to_iso;

pub(crate) const OBJECT_TYPE: &str = "suppliers";

const RESERVED_KEYS: &[&str] = &["id", "status", "createdAt", "updatedAt", "links"];

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    let supplier = load_supplier(&mut conn, supplier_id)?;

    Ok(Json(json!({
        "supplier": serialize_supplier(&state.config.base_url, &supplier)
    })))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let supplier_payload = resource_payload(&payload, "supplier")?.clone();
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let supplier = load_supplier(&mut conn, supplier_id)?;

    let delta = clean_data(&supplier_payload, RESERVED_KEYS);
    let mut merged = supplier.data.as_object().cloned().unwrap_or_default();
    for (key, value) in &delta {
        merged.insert(key.clone(), value.clone());
    }
    let name = delta
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(&supplier.name)
        .to_owned();

    let now = Utc::now().naive_utc();
    let updated: Supplier = conn.transaction::<_, AppError, _>(|conn| {
        diesel::update(suppliers::table.find(supplier.id))
            .set((
                suppliers::name.eq(&name),
                suppliers::data.eq(Value::Object(merged)),
                suppliers::updated_at.eq(now),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::SupplierUpdate,
            &actor,
            json!({"supplierId": supplier.id, "supplierJson": delta}),
            Some(AuditObject::new(OBJECT_TYPE, supplier.id)),
        )?;

        Ok(suppliers::table.find(supplier.id).first(conn)?)
    })?;

    Ok(Json(json!({
        "supplier": serialize_supplier(&state.config.base_url, &updated)
    })))
}

fn load_supplier(conn: &mut diesel::PgConnection, supplier_id: Uuid) -> AppResult<Supplier> {
    suppliers::table
        .find(supplier_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Supplier '{supplier_id}' does not exist")))
}

pub(crate) fn serialize_supplier(base_url: &str, supplier: &Supplier) -> Value {
    let mut body = supplier.data.as_object().cloned().unwrap_or_default();

    body.insert("id".into(), json!(supplier.id));
    body.insert("name".into(), json!(supplier.name));
    body.insert("status".into(), json!(supplier.status));
    body.insert("createdAt".into(), json!(to_iso(supplier.created_at)));
    body.insert("updatedAt".into(), json!(to_iso(supplier.updated_at)));
    body.insert(
        "links".into(),
        json!({
            "self": format!("{base_url}/suppliers/{}", supplier.id),
        }),
    );

    Value::Object(body)
}
