use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = frameworks)]
pub struct Framework {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = frameworks)]
pub struct NewFramework {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = lots)]
#[diesel(belongs_to(Framework, foreign_key = framework_id))]
pub struct Lot {
    pub id: Uuid,
    pub framework_id: Uuid,
    pub slug: String,
    pub name: String,
    pub allows_brief: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = lots)]
pub struct NewLot {
    pub id: Uuid,
    pub framework_id: Uuid,
    pub slug: String,
    pub name: String,
    pub allows_brief: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email_address: String,
    pub name: String,
    pub role: String,
    pub supplier_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email_address: String,
    pub name: String,
    pub role: String,
    pub supplier_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = suppliers)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub data: serde_json::Value,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = suppliers)]
pub struct NewSupplier {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = applications)]
pub struct Application {
    pub id: Uuid,
    pub data: serde_json::Value,
    pub status: String,
    pub supplier_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = applications)]
pub struct NewApplication {
    pub id: Uuid,
    pub data: serde_json::Value,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = briefs)]
#[diesel(belongs_to(Framework, foreign_key = framework_id))]
#[diesel(belongs_to(Lot, foreign_key = lot_id))]
pub struct Brief {
    pub id: Uuid,
    pub framework_id: Uuid,
    pub lot_id: Uuid,
    pub data: serde_json::Value,
    pub published_at: Option<NaiveDateTime>,
    pub withdrawn_at: Option<NaiveDateTime>,
    pub closed_notified_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = briefs)]
pub struct NewBrief {
    pub id: Uuid,
    pub framework_id: Uuid,
    pub lot_id: Uuid,
    pub data: serde_json::Value,
    pub published_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = brief_users)]
#[diesel(belongs_to(Brief, foreign_key = brief_id))]
#[diesel(belongs_to(User, foreign_key = user_id))]
#[diesel(primary_key(brief_id, user_id))]
pub struct BriefUser {
    pub brief_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = brief_users)]
pub struct NewBriefUser {
    pub brief_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = brief_clarification_questions)]
#[diesel(belongs_to(Brief, foreign_key = brief_id))]
pub struct BriefClarificationQuestion {
    pub id: Uuid,
    pub brief_id: Uuid,
    pub question: String,
    pub answer: String,
    pub published_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = brief_clarification_questions)]
pub struct NewBriefClarificationQuestion {
    pub id: Uuid,
    pub brief_id: Uuid,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = brief_responses)]
#[diesel(belongs_to(Brief, foreign_key = brief_id))]
#[diesel(belongs_to(Supplier, foreign_key = supplier_id))]
pub struct BriefResponse {
    pub id: Uuid,
    pub brief_id: Uuid,
    pub supplier_id: Uuid,
    pub data: serde_json::Value,
    pub submitted_at: Option<NaiveDateTime>,
    pub withdrawn_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = brief_responses)]
pub struct NewBriefResponse {
    pub id: Uuid,
    pub brief_id: Uuid,
    pub supplier_id: Uuid,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = work_orders)]
#[diesel(belongs_to(Brief, foreign_key = brief_id))]
#[diesel(belongs_to(Supplier, foreign_key = supplier_id))]
pub struct WorkOrder {
    pub id: Uuid,
    pub brief_id: Uuid,
    pub supplier_id: Uuid,
    pub data: serde_json::Value,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = work_orders)]
pub struct NewWorkOrder {
    pub id: Uuid,
    pub brief_id: Uuid,
    pub supplier_id: Uuid,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = audit_events)]
pub struct AuditEvent {
    pub id: Uuid,
    pub audit_type: String,
    pub actor: String,
    pub data: serde_json::Value,
    pub object_type: Option<String>,
    pub object_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_events)]
pub struct NewAuditEvent {
    pub id: Uuid,
    pub audit_type: String,
    pub actor: String,
    pub data: serde_json::Value,
    pub object_type: Option<String>,
    pub object_id: Option<Uuid>,
}
