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
use crate::error::{AppError, AppResult};
use crate::models::{Brief, NewWorkOrder, Supplier, WorkOrder};
use crate::schema::{briefs, suppliers, work_orders};
use crate::state::AppState;
use crate::utils::json::{clean_data, resource_payload, updated_by, uuid_field};

use super::to_iso;

pub(crate) const OBJECT_TYPE: &str = "work_orders";

const RESERVED_KEYS: &[&str] = &[
    "id",
    "briefId",
    "supplierId",
    "supplierCode",
    "supplierName",
    "createdAt",
    "updatedAt",
    "links",
];

pub async fn create_work_order(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let order_payload = resource_payload(&payload, "workOrder")?.clone();
    let actor = updated_by(&payload)?;

    let brief_id = uuid_field(&order_payload, "briefId")?;
    let supplier_id = uuid_field(&order_payload, "supplierId")?;

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

    let cleaned = clean_data(&order_payload, RESERVED_KEYS);

    let order_id = Uuid::new_v4();
    let order: WorkOrder = conn.transaction::<_, AppError, _>(|conn| {
        diesel::insert_into(work_orders::table)
            .values(&NewWorkOrder {
                id: order_id,
                brief_id: brief.id,
                supplier_id: supplier.id,
                data: Value::Object(cleaned.clone()),
            })
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::CreateWorkOrder,
            &actor,
            json!({"workOrderId": order_id, "workOrderJson": cleaned}),
            Some(AuditObject::new(OBJECT_TYPE, order_id)),
        )?;

        Ok(work_orders::table.find(order_id).first(conn)?)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "workOrder": serialize_work_order(&state.config.base_url, &order, &supplier)
        })),
    ))
}

pub async fn get_work_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    let (order, supplier) = load_work_order(&mut conn, order_id)?;

    Ok(Json(json!({
        "workOrder": serialize_work_order(&state.config.base_url, &order, &supplier)
    })))
}

pub async fn update_work_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let order_payload = resource_payload(&payload, "workOrder")?.clone();
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (order, supplier) = load_work_order(&mut conn, order_id)?;

    let delta = clean_data(&order_payload, RESERVED_KEYS);
    let mut merged = order.data.as_object().cloned().unwrap_or_default();
    for (key, value) in &delta {
        merged.insert(key.clone(), value.clone());
    }

    let now = Utc::now().naive_utc();
    let updated: WorkOrder = conn.transaction::<_, AppError, _>(|conn| {
        diesel::update(work_orders::table.find(order.id))
            .set((
                work_orders::data.eq(Value::Object(merged)),
                work_orders::updated_at.eq(now),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::UpdateWorkOrder,
            &actor,
            json!({"workOrderId": order.id, "workOrderJson": delta}),
            Some(AuditObject::new(OBJECT_TYPE, order.id)),
        )?;

        Ok(work_orders::table.find(order.id).first(conn)?)
    })?;

    Ok(Json(json!({
        "workOrder": serialize_work_order(&state.config.base_url, &updated, &supplier)
    })))
}

fn load_work_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<(WorkOrder, Supplier)> {
    let order: WorkOrder = work_orders::table
        .find(order_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Work order '{order_id}' does not exist")))?;
    let supplier: Supplier = suppliers::table.find(order.supplier_id).first(conn)?;
    Ok((order, supplier))
}

fn serialize_work_order(base_url: &str, order: &WorkOrder, supplier: &Supplier) -> Value {
    let mut body = order.data.as_object().cloned().unwrap_or_default();

    body.insert("id".into(), json!(order.id));
    body.insert("briefId".into(), json!(order.brief_id));
    body.insert("supplierId".into(), json!(order.supplier_id));
    body.insert("supplierName".into(), json!(supplier.name));
    body.insert("createdAt".into(), json!(to_iso(order.created_at)));
    body.insert("updatedAt".into(), json!(to_iso(order.updated_at)));
    body.insert(
        "links".into(),
        json!({
            "self": format!("{base_url}/work-orders/{}", order.id),
            "brief": format!("{base_url}/briefs/{}", order.brief_id),
            "supplier": format!("{base_url}/suppliers/{}", order.supplier_id),
        }),
    );

    Value::Object(body)
}
