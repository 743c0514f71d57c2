//! Date arithmetic for recurrence rules.
//!
//! `compute_next` steps a rule forward once from a reference date.
//! `plan_occurrence` walks a due rule forward past `today`, collapsing any
//! missed dates into a single occurrence, and applies the end date.
//!
//! Month arithmetic clamps to the last day of a shorter target month
//! (Jan 31 + 1 month is Feb 29 in a leap year, Feb 28 otherwise). Yearly
//! steps are twelve-month steps, so Feb 29 + 1 year is Feb 28.

use crate::model::recurrence::{RecurrenceRule, RecurrenceType};
use time::util::days_in_year_month;
use time::{Date, Duration, Month, Weekday};
use tracing::warn;

/// Upper bound on catch-up steps in a single pass.
pub const MAX_CATCH_UP_STEPS: u32 = 100_000;

const FALLBACK_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Not recurring, no next date, or the next date is still ahead.
    NotDue,
    /// One instance is owed for `occurrence_date`; the rule moves on to
    /// `next_occurrence_date`, which is always after today.
    Due {
        occurrence_date: Date,
        next_occurrence_date: Date,
        /// Earlier due dates folded into this occurrence.
        collapsed: u32,
    },
    /// The rule produced its last occurrence.
    Ended { last_due: Date },
}

pub fn add_days(date: Date, days: i64) -> Option<Date> {
    date.checked_add(Duration::days(days))
}

/// Adds calendar months, clamping the day to the target month's length.
pub fn add_months(date: Date, months: i64) -> Option<Date> {
    let index = i64::from(date.year()) * 12 + i64::from(u8::from(date.month())) - 1;
    let target = index.checked_add(months)?;
    let year = i32::try_from(target.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(target.rem_euclid(12) + 1).ok()?).ok()?;
    let day = date.day().min(days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).ok()
}

pub fn add_years(date: Date, years: i64) -> Option<Date> {
    add_months(date, years.checked_mul(12)?)
}

/// First date after `reference` falling on one of `days`, or a week later
/// when the set is empty.
pub fn next_listed_weekday(reference: Date, days: &[Weekday]) -> Option<Date> {
    if !days.is_empty() {
        for offset in 1..=7 {
            let candidate = add_days(reference, offset)?;
            if days.contains(&candidate.weekday()) {
                return Some(candidate);
            }
        }
    }
    add_days(reference, FALLBACK_DAYS)
}

/// The rule's next date strictly after `reference`, or `None` when the rule
/// does not recur or the date leaves the supported range.
///
/// Weekly rules without a day set step `interval` weeks. Weekly and custom
/// rules with a day set ignore the interval; an empty or unreadable set
/// steps exactly seven days.
pub fn compute_next(rule: &RecurrenceRule, reference: Date) -> Option<Date> {
    let step = rule.step();
    match rule.kind {
        RecurrenceType::None => None,
        RecurrenceType::Daily => add_days(reference, step),
        RecurrenceType::Weekly if !rule.details.has_day_set() => {
            add_days(reference, step.checked_mul(7)?)
        }
        RecurrenceType::Weekly | RecurrenceType::Custom => {
            next_listed_weekday(reference, rule.details.days_of_week())
        }
        RecurrenceType::Monthly => add_months(reference, step),
        RecurrenceType::Yearly => add_years(reference, step),
    }
}

pub fn plan_occurrence(rule: &RecurrenceRule, today: Date) -> Occurrence {
    let first_due = match rule.next_occurrence_date {
        Some(date) if rule.is_recurring() && date <= today => date,
        _ => return Occurrence::NotDue,
    };

    let mut occurrence_date = first_due;
    let mut collapsed = 0u32;
    let next_occurrence_date = loop {
        let Some(next) = compute_next(rule, occurrence_date) else {
            return Occurrence::Ended {
                last_due: occurrence_date,
            };
        };
        if next > today {
            break next;
        }

        occurrence_date = next;
        collapsed += 1;
        if collapsed >= MAX_CATCH_UP_STEPS {
            warn!(
                first_due = %first_due,
                steps = collapsed,
                "catch-up did not reach today, rebasing on today"
            );
            occurrence_date = today;
            match compute_next(rule, today) {
                Some(next) => break next,
                None => return Occurrence::Ended { last_due: today },
            }
        }
    };

    if let Some(end_date) = rule.end_date
        && (next_occurrence_date >= end_date || occurrence_date >= end_date)
    {
        return Occurrence::Ended {
            last_due: occurrence_date,
        };
    }

    Occurrence::Due {
        occurrence_date,
        next_occurrence_date,
        collapsed,
    }
}
