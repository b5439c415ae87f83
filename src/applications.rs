use std::fmt;

use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Application, NewSupplier, Supplier};
use crate::schema::{applications, suppliers, users};

/// Keys a caller may never write into an application's data blob.
pub const RESERVED_KEYS: &[&str] = &[
    "id",
    "status",
    "supplierId",
    "supplierCode",
    "createdAt",
    "updatedAt",
    "links",
];

/// Data keys carried over onto the supplier at promotion. Everything else in
/// the application blob is transient onboarding state.
const SUPPLIER_FIELDS: &[&str] = &[
    "name",
    "summary",
    "abn",
    "website",
    "linkedin",
    "addresses",
    "contacts",
    "representative",
    "phone",
    "email",
];

pub const SUPPLIER_LIMITED: &str = "limited";
pub const SUPPLIER_COMPLETE: &str = "complete";
pub const SUPPLIER_DELETED: &str = "deleted";
pub const SUPPLIER_ROLE: &str = "supplier";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Saved,
    Submitted,
    Approved,
    ApprovalRejected,
    AssessmentRejected,
    Complete,
    Deleted,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "saved",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::ApprovalRejected => "approval_rejected",
            ApplicationStatus::AssessmentRejected => "assessment_rejected",
            ApplicationStatus::Complete => "complete",
            ApplicationStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "saved" => Ok(ApplicationStatus::Saved),
            "submitted" => Ok(ApplicationStatus::Submitted),
            "approved" => Ok(ApplicationStatus::Approved),
            "approval_rejected" => Ok(ApplicationStatus::ApprovalRejected),
            "assessment_rejected" => Ok(ApplicationStatus::AssessmentRejected),
            "complete" => Ok(ApplicationStatus::Complete),
            "deleted" => Ok(ApplicationStatus::Deleted),
            _ => Err(AppError::validation("status", "invalid_status")),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Application {
    pub fn lifecycle_status(&self) -> AppResult<ApplicationStatus> {
        ApplicationStatus::parse(&self.status)
    }
}

/// The transition graph. Each arrow is the only legal forward move; the only
/// backward moves are the explicit unreject/unassess/revert arrows.
pub fn check_transition(current: ApplicationStatus, target: ApplicationStatus) -> AppResult<()> {
    use ApplicationStatus::*;

    let legal = matches!(
        (current, target),
        (Saved, Submitted)
            | (Submitted, Approved)
            | (Submitted, ApprovalRejected)
            | (Submitted, Saved)
            | (ApprovalRejected, Submitted)
            | (Approved, AssessmentRejected)
            | (Approved, Complete)
            | (AssessmentRejected, Approved)
            | (Complete, Approved)
    );

    if legal {
        Ok(())
    } else {
        Err(AppError::invalid_transition(current, target))
    }
}

/// `saved -> submitted`. Fails when already submitted (or anywhere else).
pub fn submit_for_approval(
    conn: &mut PgConnection,
    application: &Application,
    now: NaiveDateTime,
) -> AppResult<Application> {
    check_transition(application.lifecycle_status()?, ApplicationStatus::Submitted)?;
    Ok(set_status(conn, application.id, ApplicationStatus::Submitted, now)?)
}

/// `submitted -> approved | approval_rejected`. Approval materializes the
/// supplier: a first-time approval creates one with status `limited` and
/// promotes the owning users to the supplier role; an approval of an
/// existing seller's edit refreshes the supplier's copied fields and leaves
/// its status untouched. Runs inside the caller's transaction so the
/// application and supplier changes commit or roll back together.
pub fn set_approval(
    conn: &mut PgConnection,
    application: &Application,
    approved: bool,
    now: NaiveDateTime,
) -> AppResult<(Application, Option<Supplier>)> {
    let target = if approved {
        ApplicationStatus::Approved
    } else {
        ApplicationStatus::ApprovalRejected
    };
    check_transition(application.lifecycle_status()?, target)?;

    if !approved {
        let updated = set_status(conn, application.id, target, now)?;
        return Ok((updated, None));
    }

    let supplier = match application.supplier_id {
        Some(supplier_id) => refresh_supplier(conn, supplier_id, &application.data, now)?,
        None => promote_new_supplier(conn, application, now)?,
    };

    diesel::update(applications::table.find(application.id))
        .set((
            applications::status.eq(target.as_str()),
            applications::supplier_id.eq(Some(supplier.id)),
            applications::updated_at.eq(now),
        ))
        .execute(conn)?;

    let updated = applications::table.find(application.id).first(conn)?;
    Ok((updated, Some(supplier)))
}

/// `approval_rejected -> submitted`.
pub fn unreject_approval(
    conn: &mut PgConnection,
    application: &Application,
    now: NaiveDateTime,
) -> AppResult<Application> {
    let current = application.lifecycle_status()?;
    if current != ApplicationStatus::ApprovalRejected {
        return Err(AppError::invalid_transition(
            current,
            ApplicationStatus::Submitted,
        ));
    }
    Ok(set_status(conn, application.id, ApplicationStatus::Submitted, now)?)
}

/// `approved -> complete | assessment_rejected`, mirrored onto the linked
/// supplier (`complete` / `deleted`).
pub fn set_assessment_result(
    conn: &mut PgConnection,
    application: &Application,
    successful: bool,
    now: NaiveDateTime,
) -> AppResult<(Application, Supplier)> {
    let target = if successful {
        ApplicationStatus::Complete
    } else {
        ApplicationStatus::AssessmentRejected
    };
    check_transition(application.lifecycle_status()?, target)?;

    let supplier_status = if successful {
        SUPPLIER_COMPLETE
    } else {
        SUPPLIER_DELETED
    };
    let supplier = set_linked_supplier_status(conn, application, supplier_status, now)?;
    let updated = set_status(conn, application.id, target, now)?;
    Ok((updated, supplier))
}

/// `assessment_rejected | complete -> approved`, restoring the supplier to
/// `limited`.
pub fn unassess(
    conn: &mut PgConnection,
    application: &Application,
    now: NaiveDateTime,
) -> AppResult<(Application, Supplier)> {
    check_transition(application.lifecycle_status()?, ApplicationStatus::Approved)?;

    let supplier = set_linked_supplier_status(conn, application, SUPPLIER_LIMITED, now)?;
    let updated = set_status(conn, application.id, ApplicationStatus::Approved, now)?;
    Ok((updated, supplier))
}

/// `submitted -> saved`. A distinct, explicit transition; the caller records
/// its `revert_application` audit event before invoking it.
pub fn revert_to_saved(
    conn: &mut PgConnection,
    application: &Application,
    now: NaiveDateTime,
) -> AppResult<Application> {
    let current = application.lifecycle_status()?;
    if current != ApplicationStatus::Submitted {
        return Err(AppError::invalid_transition(current, ApplicationStatus::Saved));
    }
    Ok(set_status(conn, application.id, ApplicationStatus::Saved, now)?)
}

/// Soft delete: the row survives for its audit trail but is hidden from
/// reads, and any onboarding users are detached.
pub fn soft_delete(
    conn: &mut PgConnection,
    application: &Application,
    now: NaiveDateTime,
) -> AppResult<Application> {
    diesel::update(users::table.filter(users::application_id.eq(application.id)))
        .set((
            users::application_id.eq(None::<Uuid>),
            users::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(set_status(conn, application.id, ApplicationStatus::Deleted, now)?)
}

fn set_status(
    conn: &mut PgConnection,
    application_id: Uuid,
    status: ApplicationStatus,
    now: NaiveDateTime,
) -> Result<Application, diesel::result::Error> {
    diesel::update(applications::table.find(application_id))
        .set((
            applications::status.eq(status.as_str()),
            applications::updated_at.eq(now),
        ))
        .execute(conn)?;
    applications::table.find(application_id).first(conn)
}

fn set_linked_supplier_status(
    conn: &mut PgConnection,
    application: &Application,
    status: &str,
    now: NaiveDateTime,
) -> AppResult<Supplier> {
    let supplier_id = application.supplier_id.ok_or_else(|| {
        AppError::invalid_state("Application has no linked supplier".to_string())
    })?;

    diesel::update(suppliers::table.find(supplier_id))
        .set((
            suppliers::status.eq(status),
            suppliers::updated_at.eq(now),
        ))
        .execute(conn)?;

    Ok(suppliers::table.find(supplier_id).first(conn)?)
}

fn promote_new_supplier(
    conn: &mut PgConnection,
    application: &Application,
    now: NaiveDateTime,
) -> AppResult<Supplier> {
    let (name, data) = supplier_fields(&application.data);

    let new_supplier = NewSupplier {
        id: Uuid::new_v4(),
        name,
        status: SUPPLIER_LIMITED.to_owned(),
        data: Value::Object(data),
    };
    diesel::insert_into(suppliers::table)
        .values(&new_supplier)
        .execute(conn)?;

    diesel::update(users::table.filter(users::application_id.eq(application.id)))
        .set((
            users::role.eq(SUPPLIER_ROLE),
            users::supplier_id.eq(Some(new_supplier.id)),
            users::updated_at.eq(now),
        ))
        .execute(conn)?;

    Ok(suppliers::table.find(new_supplier.id).first(conn)?)
}

fn refresh_supplier(
    conn: &mut PgConnection,
    supplier_id: Uuid,
    application_data: &Value,
    now: NaiveDateTime,
) -> AppResult<Supplier> {
    let (name, data) = supplier_fields(application_data);

    diesel::update(suppliers::table.find(supplier_id))
        .set((
            suppliers::name.eq(name),
            suppliers::data.eq(Value::Object(data)),
            suppliers::updated_at.eq(now),
        ))
        .execute(conn)?;

    Ok(suppliers::table.find(supplier_id).first(conn)?)
}

/// The designated subset of application data that becomes supplier data.
pub fn supplier_fields(application_data: &Value) -> (String, Map<String, Value>) {
    let mut copied = Map::new();
    if let Some(data) = application_data.as_object() {
        for field in SUPPLIER_FIELDS {
            if let Some(value) = data.get(*field) {
                copied.insert((*field).to_owned(), value.clone());
            }
        }
    }

    let name = copied
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    (name, copied)
}
