use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::audit::{self, AuditObject, AuditType};
use crate::briefs::{self, BriefStatus};
use crate::error::{AppError, AppResult};
use crate::models::{
    Brief, BriefClarificationQuestion, Framework, Lot, NewBrief, NewBriefClarificationQuestion,
    NewBriefUser, User,
};
use crate::schema::{brief_clarification_questions, brief_users, briefs as briefs_table, frameworks, lots, users};
use crate::state::AppState;
use crate::utils::json::{clean_data, resource_payload, updated_by, uuid_field};
use crate::validation;

use super::{pagination_links, to_iso};

pub(crate) const OBJECT_TYPE: &str = "briefs";

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

pub async fn create_brief(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let brief_payload = resource_payload(&payload, "briefs")?.clone();
    let actor = updated_by(&payload)?;

    let user_id = uuid_field(&brief_payload, "userId")?;
    let framework_slug = string_field(&brief_payload, "frameworkSlug")?;
    let lot_slug = string_field(&brief_payload, "lot")?;

    let mut conn = state.db()?;

    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("User ID does not exist"))?;
    briefs::ensure_buyers(std::slice::from_ref(&user))?;

    let framework: Framework = frameworks::table
        .filter(frameworks::slug.eq(&framework_slug))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| {
            AppError::bad_request(format!("Framework '{framework_slug}' does not exist"))
        })?;
    if framework.status != "live" {
        return Err(AppError::bad_request(format!(
            "Framework '{framework_slug}' is not live"
        )));
    }

    let lot: Lot = lots::table
        .filter(lots::framework_id.eq(framework.id))
        .filter(lots::slug.eq(&lot_slug))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| {
            AppError::bad_request(format!(
                "Incorrect lot '{lot_slug}' for framework '{framework_slug}'"
            ))
        })?;
    briefs::ensure_lot_allows_brief(&framework, &lot)?;

    let mut audit_json = brief_payload.clone();
    audit_json.remove("userId");
    let cleaned = clean_data(&audit_json, briefs::RESERVED_KEYS);
    validation::validate(&cleaned, validation::BRIEF_RULES)?;

    let brief_id = Uuid::new_v4();
    let brief: Brief = conn.transaction::<_, AppError, _>(|conn| {
        let new_brief = NewBrief {
            id: brief_id,
            framework_id: framework.id,
            lot_id: lot.id,
            data: Value::Object(cleaned),
            published_at: None,
        };
        diesel::insert_into(briefs_table::table)
            .values(&new_brief)
            .execute(conn)?;

        diesel::insert_into(brief_users::table)
            .values(&NewBriefUser {
                brief_id,
                user_id: user.id,
            })
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::CreateBrief,
            &actor,
            json!({"briefId": brief_id, "briefJson": audit_json}),
            Some(AuditObject::new(OBJECT_TYPE, brief_id)),
        )?;

        Ok(briefs_table::table.find(brief_id).first(conn)?)
    })?;

    let now = Utc::now().naive_utc();
    let body = serialize_brief(&state.config.base_url, &brief, &framework, &lot, &[], now);
    Ok((StatusCode::CREATED, Json(json!({"briefs": body}))))
}

pub async fn get_brief(
    State(state): State<AppState>,
    Path(brief_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let mut conn = state.db()?;
    let (brief, framework, lot, questions) = load_brief_context(&mut conn, brief_id)?;

    let now = Utc::now().naive_utc();
    let body = serialize_brief(
        &state.config.base_url,
        &brief,
        &framework,
        &lot,
        &questions,
        now,
    );
    Ok(Json(json!({"briefs": body})))
}

pub async fn list_briefs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Value>> {
    if query.page < 1 {
        return Err(AppError::bad_request("Invalid page argument"));
    }
    let per_page = state.config.page_size;
    let mut conn = state.db()?;

    let total: i64 = briefs_table::table.count().get_result(&mut conn)?;
    let rows: Vec<(Brief, Framework, Lot)> = briefs_table::table
        .inner_join(frameworks::table)
        .inner_join(lots::table)
        .select((
            briefs_table::all_columns,
            frameworks::all_columns,
            lots::all_columns,
        ))
        .order(briefs_table::created_at.desc())
        .limit(per_page)
        .offset((query.page - 1) * per_page)
        .load(&mut conn)?;

    let now = Utc::now().naive_utc();
    let serialized: Vec<Value> = rows
        .iter()
        .map(|(brief, framework, lot)| {
            serialize_brief(&state.config.base_url, brief, framework, lot, &[], now)
        })
        .collect();

    Ok(Json(json!({
        "briefs": serialized,
        "links": pagination_links(&state.config.base_url, "/briefs", query.page, total, per_page),
    })))
}

pub async fn update_brief(
    State(state): State<AppState>,
    Path(brief_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let brief_payload = resource_payload(&payload, "briefs")?.clone();
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (brief, framework, lot, questions) = load_brief_context(&mut conn, brief_id)?;

    let delta = clean_data(&brief_payload, briefs::RESERVED_KEYS);
    let mut merged = brief.data.as_object().cloned().unwrap_or_default();
    for (key, value) in &delta {
        merged.insert(key.clone(), value.clone());
    }
    validation::validate(&merged, validation::BRIEF_RULES)?;

    let now = Utc::now().naive_utc();
    let updated: Brief = conn.transaction::<_, AppError, _>(|conn| {
        diesel::update(briefs_table::table.find(brief.id))
            .set((
                briefs_table::data.eq(Value::Object(merged)),
                briefs_table::updated_at.eq(now),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::UpdateBrief,
            &actor,
            json!({"briefId": brief.id, "briefJson": delta}),
            Some(AuditObject::new(OBJECT_TYPE, brief.id)),
        )?;

        Ok(briefs_table::table.find(brief.id).first(conn)?)
    })?;

    let body = serialize_brief(
        &state.config.base_url,
        &updated,
        &framework,
        &lot,
        &questions,
        now,
    );
    Ok(Json(json!({"briefs": body})))
}

pub async fn update_brief_status(
    State(state): State<AppState>,
    Path(brief_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let brief_payload = resource_payload(&payload, "briefs")?;
    let actor = updated_by(&payload)?;
    let target = BriefStatus::parse(&string_field(brief_payload, "status")?)?;

    let mut conn = state.db()?;
    let (brief, framework, lot, questions) = load_brief_context(&mut conn, brief_id)?;

    let now = Utc::now().naive_utc();
    let patch = briefs::plan_status_change(&brief, target, now)?;

    let brief = if patch.is_noop() {
        brief
    } else {
        conn.transaction::<_, AppError, _>(|conn| {
            if let Some(published_at) = patch.published_at {
                diesel::update(briefs_table::table.find(brief.id))
                    .set((
                        briefs_table::published_at.eq(Some(published_at)),
                        briefs_table::updated_at.eq(now),
                    ))
                    .execute(conn)?;
            }
            if let Some(withdrawn_at) = patch.withdrawn_at {
                diesel::update(briefs_table::table.find(brief.id))
                    .set((
                        briefs_table::withdrawn_at.eq(Some(withdrawn_at)),
                        briefs_table::updated_at.eq(now),
                    ))
                    .execute(conn)?;
            }

            audit::record(
                conn,
                AuditType::UpdateBriefStatus,
                &actor,
                json!({"briefId": brief.id, "briefStatus": target.as_str()}),
                Some(AuditObject::new(OBJECT_TYPE, brief.id)),
            )?;

            Ok(briefs_table::table.find(brief.id).first(conn)?)
        })?
    };

    let body = serialize_brief(
        &state.config.base_url,
        &brief,
        &framework,
        &lot,
        &questions,
        now,
    );
    Ok(Json(json!({"briefs": body})))
}

pub async fn copy_brief(
    State(state): State<AppState>,
    Path(brief_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (brief, framework, lot, _) = load_brief_context(&mut conn, brief_id)?;
    briefs::ensure_framework_live_for_copy(&framework)?;

    let member_ids: Vec<Uuid> = brief_users::table
        .filter(brief_users::brief_id.eq(brief.id))
        .select(brief_users::user_id)
        .load(&mut conn)?;

    let copy_id = Uuid::new_v4();
    let copy: Brief = conn.transaction::<_, AppError, _>(|conn| {
        let new_brief = NewBrief {
            id: copy_id,
            framework_id: brief.framework_id,
            lot_id: brief.lot_id,
            data: brief.data.clone(),
            published_at: None,
        };
        diesel::insert_into(briefs_table::table)
            .values(&new_brief)
            .execute(conn)?;

        let memberships: Vec<NewBriefUser> = member_ids
            .iter()
            .map(|user_id| NewBriefUser {
                brief_id: copy_id,
                user_id: *user_id,
            })
            .collect();
        diesel::insert_into(brief_users::table)
            .values(&memberships)
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::CreateBrief,
            &actor,
            json!({"briefId": copy_id, "originalBriefId": brief.id}),
            Some(AuditObject::new(OBJECT_TYPE, copy_id)),
        )?;

        Ok(briefs_table::table.find(copy_id).first(conn)?)
    })?;

    let now = Utc::now().naive_utc();
    let body = serialize_brief(&state.config.base_url, &copy, &framework, &lot, &[], now);
    Ok((StatusCode::CREATED, Json(json!({"briefs": body}))))
}

pub async fn delete_brief(
    State(state): State<AppState>,
    Path(brief_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    let actor = updated_by(&payload)?;

    let mut conn = state.db()?;
    let (brief, _, _, _) = load_brief_context(&mut conn, brief_id)?;

    let now = Utc::now().naive_utc();
    let status = brief.status(now);
    if status != BriefStatus::Draft {
        return Err(AppError::invalid_state(format!(
            "Cannot delete a brief with status '{status}'"
        )));
    }

    conn.transaction::<_, AppError, _>(|conn| {
        audit::record(
            conn,
            AuditType::DeleteBrief,
            &actor,
            json!({"briefId": brief.id}),
            Some(AuditObject::new(OBJECT_TYPE, brief.id)),
        )?;
        diesel::delete(briefs_table::table.find(brief.id)).execute(conn)?;
        Ok(())
    })?;

    Ok(Json(json!({"message": "done"})))
}

pub async fn create_clarification_question(
    State(state): State<AppState>,
    Path(brief_id): Path<Uuid>,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let question_payload = resource_payload(&payload, "clarificationQuestion")?;
    let actor = updated_by(&payload)?;

    if question_payload.contains_key("briefId") {
        return Err(AppError::bad_request(
            "Cannot set briefId directly, use the brief URL",
        ));
    }

    let mut conn = state.db()?;
    let (brief, _, _, _) = load_brief_context(&mut conn, brief_id)?;

    let now = Utc::now().naive_utc();
    briefs::ensure_live_for_clarification_question(&brief, now)?;

    let cleaned = clean_data(question_payload, &[]);
    validation::validate(&cleaned, validation::CLARIFICATION_QUESTION_RULES)?;

    let question_text = cleaned
        .get("question")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let answer_text = cleaned
        .get("answer")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let question_id = Uuid::new_v4();
    let question: BriefClarificationQuestion = conn.transaction::<_, AppError, _>(|conn| {
        diesel::insert_into(brief_clarification_questions::table)
            .values(&NewBriefClarificationQuestion {
                id: question_id,
                brief_id: brief.id,
                question: question_text.clone(),
                answer: answer_text.clone(),
            })
            .execute(conn)?;

        audit::record(
            conn,
            AuditType::AddBriefClarificationQuestion,
            &actor,
            json!({"briefId": brief.id, "question": question_text}),
            Some(AuditObject::new(OBJECT_TYPE, brief.id)),
        )?;

        Ok(brief_clarification_questions::table
            .find(question_id)
            .first(conn)?)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"clarificationQuestion": serialize_question(&question)})),
    ))
}

fn load_brief_context(
    conn: &mut PgConnection,
    brief_id: Uuid,
) -> AppResult<(Brief, Framework, Lot, Vec<BriefClarificationQuestion>)> {
    let brief: Brief = briefs_table::table
        .find(brief_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Brief '{brief_id}' does not exist")))?;

    let framework: Framework = frameworks::table.find(brief.framework_id).first(conn)?;
    let lot: Lot = lots::table.find(brief.lot_id).first(conn)?;

    let questions: Vec<BriefClarificationQuestion> = brief_clarification_questions::table
        .filter(brief_clarification_questions::brief_id.eq(brief.id))
        .order((
            brief_clarification_questions::published_at.asc(),
            brief_clarification_questions::id.asc(),
        ))
        .load(conn)?;

    Ok((brief, framework, lot, questions))
}

fn string_field(payload: &Map<String, Value>, key: &str) -> AppResult<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| AppError::bad_request(format!("Invalid JSON must have '{key}' key")))
}

/// Full serialized form: the data blob flattened, computed status and
/// deadline fields on top, framework/lot context and related links.
pub(crate) fn serialize_brief(
    base_url: &str,
    brief: &Brief,
    framework: &Framework,
    lot: &Lot,
    questions: &[BriefClarificationQuestion],
    now: NaiveDateTime,
) -> Value {
    let mut body = brief.data.as_object().cloned().unwrap_or_default();

    body.insert("id".into(), json!(brief.id));
    body.insert("status".into(), json!(brief.status(now).as_str()));
    body.insert("frameworkSlug".into(), json!(framework.slug));
    body.insert("frameworkName".into(), json!(framework.name));
    body.insert("frameworkStatus".into(), json!(framework.status));
    body.insert("lot".into(), json!(lot.slug));
    body.insert("lotName".into(), json!(lot.name));
    body.insert("createdAt".into(), json!(to_iso(brief.created_at)));
    body.insert("updatedAt".into(), json!(to_iso(brief.updated_at)));

    if let Some(published_at) = brief.published_at {
        body.insert("publishedAt".into(), json!(to_iso(published_at)));
    }
    if let Some(withdrawn_at) = brief.withdrawn_at {
        body.insert("withdrawnAt".into(), json!(to_iso(withdrawn_at)));
    }
    if let Some(deadlines) = brief.deadlines() {
        body.insert(
            "applicationsClosedAt".into(),
            json!(to_iso(deadlines.applications_closed_at)),
        );
        body.insert(
            "clarificationQuestionsClosedAt".into(),
            json!(to_iso(deadlines.clarification_questions_closed_at)),
        );
        body.insert(
            "clarificationQuestionsPublishedBy".into(),
            json!(to_iso(deadlines.clarification_questions_published_by)),
        );
        body.insert(
            "clarificationQuestionsAreClosed".into(),
            json!(brief.clarification_questions_are_closed(now)),
        );
    }

    body.insert(
        "clarificationQuestions".into(),
        Value::Array(questions.iter().map(serialize_question).collect()),
    );
    body.insert(
        "links".into(),
        json!({
            "self": format!("{base_url}/briefs/{}", brief.id),
            "framework": format!("{base_url}/frameworks/{}", framework.slug),
        }),
    );

    Value::Object(body)
}

fn serialize_question(question: &BriefClarificationQuestion) -> Value {
    json!({
        "question": question.question,
        "answer": question.answer,
        "publishedAt": to_iso(question.published_at),
    })
}
