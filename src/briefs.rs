use std::fmt;

use chrono::NaiveDateTime;

use crate::deadlines::{self, BriefDeadlines, RequirementsLength};
use crate::error::{AppError, AppResult};
use crate::models::{Brief, Framework, Lot, User};

/// Keys a caller may never write into a brief's data blob: identifiers,
/// computed fields, and foreign context that lives in its own columns.
pub const RESERVED_KEYS: &[&str] = &[
    "id",
    "status",
    "frameworkSlug",
    "frameworkName",
    "frameworkStatus",
    "lot",
    "lotSlug",
    "lotName",
    "publishedAt",
    "withdrawnAt",
    "createdAt",
    "updatedAt",
    "links",
];

pub const BUYER_ROLE: &str = "buyer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BriefStatus {
    Draft,
    Live,
    Closed,
    Withdrawn,
}

impl BriefStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BriefStatus::Draft => "draft",
            BriefStatus::Live => "live",
            BriefStatus::Closed => "closed",
            BriefStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "draft" => Ok(BriefStatus::Draft),
            "live" => Ok(BriefStatus::Live),
            "closed" => Ok(BriefStatus::Closed),
            "withdrawn" => Ok(BriefStatus::Withdrawn),
            _ => Err(AppError::validation("status", "invalid_status")),
        }
    }
}

impl fmt::Display for BriefStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Brief {
    pub fn requirements_length(&self) -> RequirementsLength {
        RequirementsLength::from_data(&self.data)
    }

    /// Derived deadline fields; absent until the brief has been published.
    pub fn deadlines(&self) -> Option<BriefDeadlines> {
        self.published_at
            .map(|published_at| deadlines::compute(published_at, self.requirements_length()))
    }

    /// Status is never stored. It is a pure function of the publication and
    /// withdrawal instants and the supplied clock reading.
    pub fn status(&self, now: NaiveDateTime) -> BriefStatus {
        if self.withdrawn_at.is_some() {
            return BriefStatus::Withdrawn;
        }
        match self.deadlines() {
            None => BriefStatus::Draft,
            Some(deadlines) if now < deadlines.applications_closed_at => BriefStatus::Live,
            Some(_) => BriefStatus::Closed,
        }
    }

    pub fn clarification_questions_are_closed(&self, now: NaiveDateTime) -> bool {
        match self.deadlines() {
            Some(deadlines) => now >= deadlines.clarification_questions_closed_at,
            None => false,
        }
    }
}

/// Timestamp assignments implied by a legal status change. Applied by the
/// caller in the same transaction as its audit event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusPatch {
    pub published_at: Option<NaiveDateTime>,
    pub withdrawn_at: Option<NaiveDateTime>,
}

impl StatusPatch {
    pub fn is_noop(&self) -> bool {
        self.published_at.is_none() && self.withdrawn_at.is_none()
    }
}

/// Validates an explicit status assignment against the current computed
/// status. Assigning the current status is a no-op; `closed` is reachable
/// only by time elapsing and `withdrawn` is terminal.
pub fn plan_status_change(
    brief: &Brief,
    target: BriefStatus,
    now: NaiveDateTime,
) -> AppResult<StatusPatch> {
    let current = brief.status(now);
    if current == target {
        return Ok(StatusPatch::default());
    }

    match (current, target) {
        (BriefStatus::Draft, BriefStatus::Live) => Ok(StatusPatch {
            published_at: Some(now),
            withdrawn_at: None,
        }),
        (BriefStatus::Live, BriefStatus::Withdrawn) => Ok(StatusPatch {
            published_at: None,
            withdrawn_at: Some(now),
        }),
        (from, to) => Err(AppError::invalid_transition(from, to)),
    }
}

/// Brief membership is buyers only.
pub fn ensure_buyers(users: &[User]) -> AppResult<()> {
    match users.iter().find(|user| user.role != BUYER_ROLE) {
        Some(user) => Err(AppError::bad_request(format!(
            "User '{}' must have role '{BUYER_ROLE}' to be added to a brief",
            user.email_address
        ))),
        None => Ok(()),
    }
}

/// Construction-time consistency: the lot must belong to the framework and
/// must accept briefs at all.
pub fn ensure_lot_allows_brief(framework: &Framework, lot: &Lot) -> AppResult<()> {
    if lot.framework_id != framework.id {
        return Err(AppError::bad_request(format!(
            "Incorrect lot '{}' for framework '{}'",
            lot.slug, framework.slug
        )));
    }
    if !lot.allows_brief {
        return Err(AppError::bad_request(format!(
            "Lot '{}' does not allow briefs",
            lot.slug
        )));
    }
    Ok(())
}

/// Clarification questions may only be attached while the brief is live.
pub fn ensure_live_for_clarification_question(
    brief: &Brief,
    now: NaiveDateTime,
) -> AppResult<()> {
    let status = brief.status(now);
    if status != BriefStatus::Live {
        return Err(AppError::invalid_state(format!(
            "Brief status must be 'live', not '{status}'"
        )));
    }
    Ok(())
}

/// A brief can be copied only while its framework is still live.
pub fn ensure_framework_live_for_copy(framework: &Framework) -> AppResult<()> {
    if framework.status != "live" {
        return Err(AppError::bad_request("Framework is not live"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;
    use uuid::Uuid;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .expect("valid test datetime")
    }

    fn brief(
        published_at: Option<NaiveDateTime>,
        withdrawn_at: Option<NaiveDateTime>,
    ) -> Brief {
        let created = utc(2016, 1, 1, 0);
        Brief {
            id: Uuid::new_v4(),
            framework_id: Uuid::new_v4(),
            lot_id: Uuid::new_v4(),
            data: json!({}),
            published_at,
            withdrawn_at,
            closed_notified_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn user(role: &str) -> User {
        let created = utc(2016, 1, 1, 0);
        User {
            id: Uuid::new_v4(),
            email_address: format!("{role}@example.gov.au"),
            name: role.to_owned(),
            role: role.to_owned(),
            supplier_id: None,
            application_id: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn status_defaults_to_draft() {
        let now = utc(2016, 3, 3, 12);
        assert_eq!(brief(None, None).status(now), BriefStatus::Draft);
    }

    #[test]
    fn published_brief_is_live_until_close() {
        let published = utc(2016, 3, 3, 12);
        let subject = brief(Some(published), None);

        assert_eq!(subject.status(published), BriefStatus::Live);
        // Two-week default closes 2016-03-17T07:00Z.
        assert_eq!(subject.status(utc(2016, 3, 17, 6)), BriefStatus::Live);
        assert_eq!(subject.status(utc(2016, 3, 17, 7)), BriefStatus::Closed);
    }

    #[test]
    fn withdrawn_wins_regardless_of_time() {
        let published = utc(2016, 3, 3, 12);
        let subject = brief(Some(published), Some(published + Duration::days(1)));

        assert_eq!(subject.status(utc(2000, 1, 1, 0)), BriefStatus::Withdrawn);
        assert_eq!(subject.status(utc(2030, 1, 1, 0)), BriefStatus::Withdrawn);
    }

    #[test]
    fn draft_has_no_deadlines() {
        assert!(brief(None, None).deadlines().is_none());
    }

    #[test]
    fn publishing_sets_published_at() {
        let now = utc(2016, 3, 3, 12);
        let patch = plan_status_change(&brief(None, None), BriefStatus::Live, now)
            .expect("draft to live is legal");
        assert_eq!(patch.published_at, Some(now));
        assert_eq!(patch.withdrawn_at, None);
    }

    #[test]
    fn withdrawing_sets_withdrawn_at() {
        let published = utc(2016, 3, 3, 12);
        let now = published + Duration::days(1);
        let patch = plan_status_change(&brief(Some(published), None), BriefStatus::Withdrawn, now)
            .expect("live to withdrawn is legal");
        assert_eq!(patch.withdrawn_at, Some(now));
    }

    #[test]
    fn same_status_is_a_noop() {
        let now = utc(2016, 3, 3, 12);
        let patch = plan_status_change(&brief(None, None), BriefStatus::Draft, now)
            .expect("no-op is legal");
        assert!(patch.is_noop());
    }

    #[test]
    fn draft_cannot_be_withdrawn() {
        let now = utc(2016, 3, 3, 12);
        let result = plan_status_change(&brief(None, None), BriefStatus::Withdrawn, now);
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    }

    #[test]
    fn live_cannot_return_to_draft() {
        let published = utc(2016, 3, 3, 12);
        let result = plan_status_change(&brief(Some(published), None), BriefStatus::Draft, published);
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    }

    #[test]
    fn closed_is_not_assignable() {
        let now = utc(2016, 3, 3, 12);
        for subject in [brief(None, None), brief(Some(now), None)] {
            let result = plan_status_change(&subject, BriefStatus::Closed, now);
            assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
        }
    }

    #[test]
    fn withdrawn_is_terminal() {
        let published = utc(2016, 3, 3, 12);
        let subject = brief(Some(published), Some(published + Duration::days(1)));
        let now = published + Duration::days(2);

        for target in [BriefStatus::Draft, BriefStatus::Live, BriefStatus::Closed] {
            let result = plan_status_change(&subject, target, now);
            assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
        }
    }

    #[test]
    fn unknown_status_string_is_a_validation_error() {
        assert!(matches!(
            BriefStatus::parse("invalid"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn non_buyers_are_rejected() {
        assert!(ensure_buyers(&[user("buyer")]).is_ok());
        assert!(ensure_buyers(&[user("buyer"), user("admin")]).is_err());
    }

    #[test]
    fn clarification_questions_need_a_live_brief() {
        let published = utc(2016, 3, 3, 12);
        let now = utc(2016, 3, 4, 12);

        assert!(ensure_live_for_clarification_question(&brief(Some(published), None), now).is_ok());

        let result = ensure_live_for_clarification_question(&brief(None, None), now);
        match result {
            Err(AppError::InvalidState(message)) => {
                assert_eq!(message, "Brief status must be 'live', not 'draft'")
            }
            other => panic!("expected invalid state, got {other:?}"),
        }

        let long_closed = brief(Some(utc(2000, 1, 1, 0)), None);
        assert!(ensure_live_for_clarification_question(&long_closed, now).is_err());
    }

    #[test]
    fn question_window_tracks_the_deadline() {
        let published = utc(2016, 3, 3, 12);
        let subject = brief(Some(published), None);

        // Two-week default: questions close 2016-03-10T07:00Z.
        assert!(!subject.clarification_questions_are_closed(utc(2016, 3, 10, 6)));
        assert!(subject.clarification_questions_are_closed(utc(2016, 3, 10, 7)));
    }
}
