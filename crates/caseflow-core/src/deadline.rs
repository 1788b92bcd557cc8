//! Due-date computation for grievance steps.
//!
//! Pure calendar arithmetic: no side effects, no clock reads. The only
//! failure mode is an invalid input (negative day count).
//!
//! Business-day mode skips Saturday and Sunday. Statutory holidays are not
//! modeled; agreements that count holidays as non-working days will see due
//! dates one or more days early. `compute_due_date` is the single place a
//! holiday calendar would plug in.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use crate::EngineError;

/// Compute the due date `days` after `anchor`.
///
/// With `calendar_days` the count includes weekends; otherwise the anchor is
/// advanced one business day at a time, skipping Saturday and Sunday.
///
/// `days == 0` is valid input meaning "no deadline" and returns the anchor
/// unchanged; callers that want "no deadline" semantics should not display a
/// due date at all (the state machine stores `None` for untimed templates
/// rather than calling this).
///
/// # Errors
///
/// [`EngineError::InvalidArgument`] when `days` is negative.
pub fn compute_due_date(
    anchor: DateTime<Utc>,
    days: i64,
    calendar_days: bool,
) -> Result<DateTime<Utc>, EngineError> {
    if days < 0 {
        return Err(EngineError::InvalidArgument(format!(
            "day count must be non-negative, got {}",
            days
        )));
    }

    if calendar_days {
        return Ok(anchor + Duration::days(days));
    }

    let mut due = anchor;
    for _ in 0..days {
        due += Duration::days(1);
        while is_weekend(due) {
            due += Duration::days(1);
        }
    }
    Ok(due)
}

/// Whether a step at `due_date` is overdue as of `today`.
///
/// Both sides are date-truncated: a step due today is not overdue until
/// tomorrow. Resolved cases are never overdue; callers check activity first
/// (the reporting view filters on `status == ACTIVE` before asking).
pub fn is_overdue(due_date: DateTime<Utc>, today: DateTime<Utc>) -> bool {
    today.date_naive() > due_date.date_naive()
}

fn is_weekend(ts: DateTime<Utc>) -> bool {
    matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}
