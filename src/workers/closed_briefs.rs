use chrono::Utc;
use diesel::prelude::*;
use tracing::warn;

use crate::briefs::BriefStatus;
use crate::models::Brief;
use crate::schema::{brief_users, briefs, users};
use crate::state::AppState;

/// One sweep over published briefs whose computed close time has passed and
/// that have not been notified yet. The `closed_notified_at` marker is
/// stamped only after a successful delivery, so re-running the sweep never
/// re-sends and a failed delivery is retried on the next tick.
pub async fn scan(state: &AppState) -> anyhow::Result<usize> {
    let mut conn = state.pool.get()?;
    let now = Utc::now().naive_utc();

    let candidates: Vec<Brief> = briefs::table
        .filter(briefs::published_at.is_not_null())
        .filter(briefs::withdrawn_at.is_null())
        .filter(briefs::closed_notified_at.is_null())
        .order(briefs::published_at.asc())
        .load(&mut conn)?;

    let mut notified = 0;
    for brief in candidates {
        if brief.status(now) != BriefStatus::Closed {
            continue;
        }

        let recipients: Vec<String> = brief_users::table
            .inner_join(users::table)
            .filter(brief_users::brief_id.eq(brief.id))
            .select(users::email_address)
            .load(&mut conn)?;

        if !recipients.is_empty() {
            let title = brief
                .data
                .get("title")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("your brief");
            let body = format!("Responses to {title} have closed and are ready for review.");

            if let Err(err) = state
                .notifier
                .send(&recipients, "Brief closed", &body)
                .await
            {
                warn!(brief_id = %brief.id, error = %err, "closed-brief notification failed");
                continue;
            }
        }

        diesel::update(briefs::table.find(brief.id))
            .set(briefs::closed_notified_at.eq(Some(now)))
            .execute(&mut conn)?;
        notified += 1;
    }

    Ok(notified)
}
