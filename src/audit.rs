use std::fmt;
use std::str::FromStr;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AuditEvent, NewAuditEvent};
use crate::schema::audit_events;

/// Every kind of state-changing event the marketplace records. Closed set:
/// interpreting code matches exhaustively, so a new kind cannot be silently
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditType {
    CreateBrief,
    UpdateBrief,
    UpdateBriefStatus,
    DeleteBrief,
    AddBriefClarificationQuestion,
    CreateBriefResponse,
    UpdateBriefResponse,
    CreateWorkOrder,
    UpdateWorkOrder,
    CreateApplication,
    UpdateApplication,
    SubmitApplication,
    ApproveApplication,
    RejectApplication,
    RevertApplication,
    UnrejectApplication,
    AssessApplication,
    UnassessApplication,
    DeleteApplication,
    RegisterFrameworkInterest,
    SupplierUpdate,
    AnswerSelectionQuestions,
    DeleteCasestudy,
    DuplicateSupplier,
    CreateUser,
    UpdateUser,
}

impl AuditType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditType::CreateBrief => "create_brief",
            AuditType::UpdateBrief => "update_brief",
            AuditType::UpdateBriefStatus => "update_brief_status",
            AuditType::DeleteBrief => "delete_brief",
            AuditType::AddBriefClarificationQuestion => "add_brief_clarification_question",
            AuditType::CreateBriefResponse => "create_brief_response",
            AuditType::UpdateBriefResponse => "update_brief_response",
            AuditType::CreateWorkOrder => "create_work_order",
            AuditType::UpdateWorkOrder => "update_work_order",
            AuditType::CreateApplication => "create_application",
            AuditType::UpdateApplication => "update_application",
            AuditType::SubmitApplication => "submit_application",
            AuditType::ApproveApplication => "approve_application",
            AuditType::RejectApplication => "reject_application",
            AuditType::RevertApplication => "revert_application",
            AuditType::UnrejectApplication => "unreject_application",
            AuditType::AssessApplication => "assess_application",
            AuditType::UnassessApplication => "unassess_application",
            AuditType::DeleteApplication => "delete_application",
            AuditType::RegisterFrameworkInterest => "register_framework_interest",
            AuditType::SupplierUpdate => "supplier_update",
            AuditType::AnswerSelectionQuestions => "answer_selection_questions",
            AuditType::DeleteCasestudy => "delete_casestudy",
            AuditType::DuplicateSupplier => "duplicate_supplier",
            AuditType::CreateUser => "create_user",
            AuditType::UpdateUser => "update_user",
        }
    }
}

impl fmt::Display for AuditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create_brief" => Ok(AuditType::CreateBrief),
            "update_brief" => Ok(AuditType::UpdateBrief),
            "update_brief_status" => Ok(AuditType::UpdateBriefStatus),
            "delete_brief" => Ok(AuditType::DeleteBrief),
            "add_brief_clarification_question" => Ok(AuditType::AddBriefClarificationQuestion),
            "create_brief_response" => Ok(AuditType::CreateBriefResponse),
            "update_brief_response" => Ok(AuditType::UpdateBriefResponse),
            "create_work_order" => Ok(AuditType::CreateWorkOrder),
            "update_work_order" => Ok(AuditType::UpdateWorkOrder),
            "create_application" => Ok(AuditType::CreateApplication),
            "update_application" => Ok(AuditType::UpdateApplication),
            "submit_application" => Ok(AuditType::SubmitApplication),
            "approve_application" => Ok(AuditType::ApproveApplication),
            "reject_application" => Ok(AuditType::RejectApplication),
            "revert_application" => Ok(AuditType::RevertApplication),
            "unreject_application" => Ok(AuditType::UnrejectApplication),
            "assess_application" => Ok(AuditType::AssessApplication),
            "unassess_application" => Ok(AuditType::UnassessApplication),
            "delete_application" => Ok(AuditType::DeleteApplication),
            "register_framework_interest" => Ok(AuditType::RegisterFrameworkInterest),
            "supplier_update" => Ok(AuditType::SupplierUpdate),
            "answer_selection_questions" => Ok(AuditType::AnswerSelectionQuestions),
            "delete_casestudy" => Ok(AuditType::DeleteCasestudy),
            "duplicate_supplier" => Ok(AuditType::DuplicateSupplier),
            "create_user" => Ok(AuditType::CreateUser),
            "update_user" => Ok(AuditType::UpdateUser),
            other => Err(AppError::bad_request(format!(
                "Unknown audit type '{other}'"
            ))),
        }
    }
}

/// The entity an event concerns, resolved at read time for display only.
/// The audit trail outlives its subject.
#[derive(Debug, Clone, Copy)]
pub struct AuditObject<'a> {
    pub object_type: &'a str,
    pub object_id: Uuid,
}

impl<'a> AuditObject<'a> {
    pub fn new(object_type: &'a str, object_id: Uuid) -> Self {
        Self {
            object_type,
            object_id,
        }
    }
}

/// Appends one event row. Callers invoke this inside the transaction that
/// performs the mutation, so the event and the change commit together. The
/// actor may be empty for system-initiated events. There is deliberately no
/// update or delete counterpart.
pub fn record(
    conn: &mut PgConnection,
    audit_type: AuditType,
    actor: &str,
    data: Value,
    object: Option<AuditObject<'_>>,
) -> Result<AuditEvent, diesel::result::Error> {
    let new_event = NewAuditEvent {
        id: Uuid::new_v4(),
        audit_type: audit_type.as_str().to_owned(),
        actor: actor.to_owned(),
        data,
        object_type: object.map(|o| o.object_type.to_owned()),
        object_id: object.map(|o| o.object_id),
    };

    diesel::insert_into(audit_events::table)
        .values(&new_event)
        .execute(conn)?;

    audit_events::table.find(new_event.id).first(conn)
}

/// Events for one subject in creation order: the canonical history.
pub fn for_object(
    conn: &mut PgConnection,
    object_type: &str,
    object_id: Uuid,
) -> Result<Vec<AuditEvent>, diesel::result::Error> {
    audit_events::table
        .filter(audit_events::object_type.eq(object_type))
        .filter(audit_events::object_id.eq(object_id))
        .order((audit_events::created_at.asc(), audit_events::id.asc()))
        .load(conn)
}

#[cfg(test)]
mod tests {
    use super::AuditType;
    use std::str::FromStr;

    const ALL: &[AuditType] = &[
        AuditType::CreateBrief,
        AuditType::UpdateBrief,
        AuditType::UpdateBriefStatus,
        AuditType::DeleteBrief,
        AuditType::AddBriefClarificationQuestion,
        AuditType::CreateBriefResponse,
        AuditType::UpdateBriefResponse,
        AuditType::CreateWorkOrder,
        AuditType::UpdateWorkOrder,
        AuditType::CreateApplication,
        AuditType::UpdateApplication,
        AuditType::SubmitApplication,
        AuditType::ApproveApplication,
        AuditType::RejectApplication,
        AuditType::RevertApplication,
        AuditType::UnrejectApplication,
        AuditType::AssessApplication,
        AuditType::UnassessApplication,
        AuditType::DeleteApplication,
        AuditType::RegisterFrameworkInterest,
        AuditType::SupplierUpdate,
        AuditType::AnswerSelectionQuestions,
        AuditType::DeleteCasestudy,
        AuditType::DuplicateSupplier,
        AuditType::CreateUser,
        AuditType::UpdateUser,
    ];

    #[test]
    fn names_round_trip() {
        for audit_type in ALL {
            let parsed = AuditType::from_str(audit_type.as_str()).expect("known name");
            assert_eq!(parsed, *audit_type);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(AuditType::from_str("made_up_event").is_err());
    }
}
