use chrono::{Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use serde_json::Value;

/// Deadline arithmetic happens on the Sydney calendar; instants are stored
/// and compared in UTC.
pub const DEADLINES_TZ: Tz = chrono_tz::Australia::Sydney;

const CLOSING_HOUR: u32 = 18;

/// How long a brief accepts responses, from its `requirementsLength` data
/// key. Anything other than the literal "1 week" means two weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequirementsLength {
    OneWeek,
    #[default]
    TwoWeeks,
}

impl RequirementsLength {
    pub fn from_data(data: &Value) -> Self {
        match data.get("requirementsLength").and_then(Value::as_str) {
            Some("1 week") => RequirementsLength::OneWeek,
            _ => RequirementsLength::TwoWeeks,
        }
    }

    pub fn closing_weeks(self) -> i64 {
        match self {
            RequirementsLength::OneWeek => 1,
            RequirementsLength::TwoWeeks => 2,
        }
    }

    /// Sydney workdays between publication and the clarification-question
    /// cutoff.
    pub fn questions_duration_workdays(self) -> i64 {
        match self {
            RequirementsLength::OneWeek => 2,
            RequirementsLength::TwoWeeks => 5,
        }
    }
}

/// Every temporal field derived from a publish instant. Recomputed on each
/// read; nothing here is stored or independently mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BriefDeadlines {
    /// Sydney calendar day the brief was published.
    pub published_day: NaiveDate,
    /// Sydney calendar day responses close.
    pub applications_closing_date: NaiveDate,
    /// UTC instant responses close (18:00 Sydney on the closing day).
    pub applications_closed_at: NaiveDateTime,
    /// UTC instant clarification questions stop being accepted.
    pub clarification_questions_closed_at: NaiveDateTime,
    /// UTC instant by which all clarification answers must be published.
    pub clarification_questions_published_by: NaiveDateTime,
}

pub fn compute(published_at: NaiveDateTime, length: RequirementsLength) -> BriefDeadlines {
    let published_day = sydney_day(published_at);
    let closing_date = published_day + Duration::weeks(length.closing_weeks());
    let questions_close = add_workdays(published_day, length.questions_duration_workdays());

    BriefDeadlines {
        published_day,
        applications_closing_date: closing_date,
        applications_closed_at: closing_instant(closing_date),
        clarification_questions_closed_at: closing_instant(questions_close),
        clarification_questions_published_by: closing_instant(answers_due_day(closing_date)),
    }
}

/// The Sydney calendar day an UTC instant falls on.
pub fn sydney_day(utc: NaiveDateTime) -> NaiveDate {
    DEADLINES_TZ.from_utc_datetime(&utc).date_naive()
}

fn add_workdays(start: NaiveDate, count: i64) -> NaiveDate {
    let mut day = start;
    let mut remaining = count;
    while remaining > 0 {
        day += Duration::days(1);
        if !is_weekend(day) {
            remaining -= 1;
        }
    }
    day
}

/// Answers are due the day before close; a Saturday rolls back to Friday.
fn answers_due_day(closing_date: NaiveDate) -> NaiveDate {
    let day = closing_date - Duration::days(1);
    if day.weekday() == Weekday::Sat {
        day - Duration::days(1)
    } else {
        day
    }
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// 18:00 Sydney local on the given day, as a UTC instant. DST transitions in
/// Sydney happen at 02:00/03:00, so 18:00 resolves unambiguously; the
/// fallback offset is never reached in practice.
fn closing_instant(day: NaiveDate) -> NaiveDateTime {
    let local = day.and_time(NaiveTime::from_hms_opt(CLOSING_HOUR, 0, 0).unwrap_or_default());
    match DEADLINES_TZ.from_local_datetime(&local) {
        LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => instant.naive_utc(),
        LocalResult::None => local - Duration::hours(10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, mi, s))
            .expect("valid test datetime")
    }

    fn day(y: i32, mo: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, mo, d).expect("valid test date")
    }

    #[test]
    fn default_length_is_two_weeks() {
        let published = utc(2016, 3, 3, 12, 30, 1);
        let deadlines = compute(published, RequirementsLength::default());

        assert_eq!(deadlines.applications_closed_at, utc(2016, 3, 17, 7, 0, 0));
        assert_eq!(
            deadlines.clarification_questions_closed_at,
            utc(2016, 3, 10, 7, 0, 0)
        );
        assert_eq!(
            deadlines.clarification_questions_published_by,
            utc(2016, 3, 16, 7, 0, 0)
        );
    }

    #[test]
    fn explicit_two_weeks_matches_the_default() {
        let published = utc(2016, 3, 3, 12, 30, 1);
        assert_eq!(
            compute(published, RequirementsLength::TwoWeeks),
            compute(published, RequirementsLength::default())
        );
    }

    #[test]
    fn one_week_brief() {
        let published = utc(2016, 3, 3, 12, 30, 1);
        let deadlines = compute(published, RequirementsLength::OneWeek);

        assert_eq!(deadlines.applications_closed_at, utc(2016, 3, 10, 7, 0, 0));
        assert_eq!(
            deadlines.clarification_questions_closed_at,
            utc(2016, 3, 7, 7, 0, 0)
        );
        assert_eq!(
            deadlines.clarification_questions_published_by,
            utc(2016, 3, 9, 7, 0, 0)
        );
    }

    #[test]
    fn publish_day_follows_the_sydney_calendar() {
        // 14:30 UTC on the 3rd is already the 4th in Sydney during DST.
        let published = utc(2016, 3, 3, 14, 30, 0);
        let deadlines = compute(published, RequirementsLength::TwoWeeks);

        assert_eq!(deadlines.published_day, day(2016, 3, 4));
        assert_eq!(deadlines.applications_closing_date, day(2016, 3, 18));
    }

    #[test]
    fn every_sydney_hour_of_one_day_closes_at_the_same_instant() {
        // Sunday 2016-01-03 in Sydney (AEDT, UTC+11), one week length:
        // closing Sunday the 10th at 18:00 local = 07:00 UTC.
        for hour in 0..24 {
            let sydney_local = day(2016, 1, 3)
                .and_hms_opt(hour, 0, 0)
                .expect("valid test datetime");
            let published = match DEADLINES_TZ.from_local_datetime(&sydney_local) {
                LocalResult::Single(instant) => instant.naive_utc(),
                other => panic!("unexpected local resolution: {other:?}"),
            };

            let deadlines = compute(published, RequirementsLength::OneWeek);

            assert_eq!(deadlines.published_day, day(2016, 1, 3));
            assert_eq!(deadlines.applications_closed_at, utc(2016, 1, 10, 7, 0, 0));
            // Two workdays from Sunday: Monday, Tuesday the 5th.
            assert_eq!(
                deadlines.clarification_questions_closed_at,
                utc(2016, 1, 5, 7, 0, 0)
            );
            // The day before close is a Saturday, so answers are due Friday.
            assert_eq!(
                deadlines.clarification_questions_published_by,
                utc(2016, 1, 8, 7, 0, 0)
            );
        }
    }

    #[test]
    fn winter_briefs_close_at_eight_utc() {
        // June is AEST (UTC+10): 18:00 Sydney = 08:00 UTC.
        let published = utc(2016, 6, 1, 2, 0, 0);
        let deadlines = compute(published, RequirementsLength::TwoWeeks);

        assert_eq!(deadlines.applications_closed_at, utc(2016, 6, 15, 8, 0, 0));
    }

    #[test]
    fn closing_window_spanning_dst_end_shifts_offset() {
        // Published during AEDT, closing after the first Sunday in April
        // when Sydney falls back to AEST.
        let published = utc(2016, 3, 24, 1, 0, 0);
        let deadlines = compute(published, RequirementsLength::TwoWeeks);

        assert_eq!(deadlines.applications_closing_date, day(2016, 4, 7));
        assert_eq!(deadlines.applications_closed_at, utc(2016, 4, 7, 8, 0, 0));
    }

    #[test]
    fn workday_counting_skips_weekends() {
        // Friday publish + 5 workdays lands on the following Friday.
        assert_eq!(add_workdays(day(2016, 3, 4), 5), day(2016, 3, 11));
        // Saturday publish + 2 workdays lands on Tuesday.
        assert_eq!(add_workdays(day(2016, 1, 2), 2), day(2016, 1, 5));
    }

    #[test]
    fn requirements_length_parsing() {
        assert_eq!(
            RequirementsLength::from_data(&serde_json::json!({"requirementsLength": "1 week"})),
            RequirementsLength::OneWeek
        );
        assert_eq!(
            RequirementsLength::from_data(&serde_json::json!({"requirementsLength": "2 weeks"})),
            RequirementsLength::TwoWeeks
        );
        assert_eq!(
            RequirementsLength::from_data(&serde_json::json!({})),
            RequirementsLength::TwoWeeks
        );
    }
}
