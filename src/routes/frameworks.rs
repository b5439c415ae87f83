use axum::{extract::State, Json};
use diesel::prelude::*;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::models::{Framework, Lot};
use crate::schema::{frameworks, lots};
use crate::state::AppState;

pub async fn list_frameworks(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;

    let framework_list: Vec<Framework> = frameworks::table
        .order(frameworks::slug.asc())
        .load(&mut conn)?;
    let lot_list: Vec<Lot> = lots::table.order(lots::slug.asc()).load(&mut conn)?;

    let serialized: Vec<Value> = framework_list
        .iter()
        .map(|framework| {
            let framework_lots: Vec<Value> = lot_list
                .iter()
                .filter(|lot| lot.framework_id == framework.id)
                .map(|lot| {
                    json!({
                        "slug": lot.slug,
                        "name": lot.name,
                        "allowsBrief": lot.allows_brief,
                    })
                })
                .collect();

            json!({
                "id": framework.id,
                "slug": framework.slug,
                "name": framework.name,
                "status": framework.status,
                "lots": framework_lots,
                "links": {
                    "self": format!("{}/frameworks/{}", state.config.base_url, framework.slug),
                },
            })
        })
        .collect();

    Ok(Json(json!({"frameworks": serialized})))
}
