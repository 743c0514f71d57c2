use crate::error::AppError;
use crate::model::date_text;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::{Date, Weekday};
use tracing::warn;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }

    pub fn is_recurring(&self) -> bool {
        *self != Self::None
    }
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom),
            other => Err(AppError::invalid_input(format!(
                "unknown recurrence type '{other}' (expected none, daily, weekly, monthly, yearly or custom)"
            ))),
        }
    }
}

/// Structured rule details, persisted as JSON text in `recurrence_details`.
///
/// Weekdays are kept in Monday-first order without duplicates. A weekday
/// list that was stored but is empty or unreadable still counts as a day
/// set, which steps weekly rules by exactly seven days.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecurrenceDetails {
    days_of_week: Vec<Weekday>,
    has_day_set: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredDetails {
    #[serde(rename = "daysOfWeek", default, skip_serializing_if = "Option::is_none")]
    days_of_week: Option<Vec<String>>,
}

impl RecurrenceDetails {
    pub fn with_days<I>(days: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        let mut days_of_week: Vec<Weekday> = Vec::new();
        for day in days {
            if !days_of_week.contains(&day) {
                days_of_week.push(day);
            }
        }
        days_of_week.sort_by_key(|day| day.number_days_from_monday());
        Self {
            days_of_week,
            has_day_set: true,
        }
    }

    fn unreadable() -> Self {
        Self {
            days_of_week: Vec::new(),
            has_day_set: true,
        }
    }

    /// Builds details from weekday names, rejecting unknown names. No names
    /// means no day set.
    pub fn from_day_names<S: AsRef<str>>(names: &[S]) -> Result<Self, AppError> {
        if names.is_empty() {
            return Ok(Self::default());
        }
        let mut days = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let day = weekday_from_name(name)
                .ok_or_else(|| AppError::invalid_input(format!("unknown weekday '{name}'")))?;
            days.push(day);
        }
        Ok(Self::with_days(days))
    }

    /// Reads the persisted text form. Unparseable text and unknown weekday
    /// names degrade to an empty day set.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        match serde_json::from_str::<StoredDetails>(trimmed) {
            Ok(stored) => Self::from_stored(stored),
            Err(err) => {
                warn!(details = trimmed, "ignoring malformed recurrence_details: {err}");
                Self::unreadable()
            }
        }
    }

    pub fn to_text(&self) -> String {
        let stored = StoredDetails {
            days_of_week: self
                .has_day_set
                .then(|| self.day_names().iter().map(|name| name.to_string()).collect()),
        };
        serde_json::to_string(&stored).unwrap_or_else(|_| "{}".to_string())
    }

    fn from_stored(stored: StoredDetails) -> Self {
        let Some(names) = stored.days_of_week else {
            return Self::default();
        };
        let mut days = Vec::with_capacity(names.len());
        for name in &names {
            match weekday_from_name(name) {
                Some(day) => days.push(day),
                None => warn!(weekday = name.as_str(), "ignoring unknown weekday name"),
            }
        }
        Self::with_days(days)
    }

    pub fn days_of_week(&self) -> &[Weekday] {
        &self.days_of_week
    }

    pub fn day_names(&self) -> Vec<&'static str> {
        self.days_of_week.iter().map(|day| weekday_name(*day)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.days_of_week.is_empty()
    }

    pub fn has_day_set(&self) -> bool {
        self.has_day_set
    }
}

impl Serialize for RecurrenceDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for RecurrenceDetails {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older rows hold the parsed object rather than its text.
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_json::Value::Null => Self::default(),
            serde_json::Value::String(text) => Self::from_text(&text),
            other => match serde_json::from_value::<StoredDetails>(other) {
                Ok(stored) => Self::from_stored(stored),
                Err(err) => {
                    warn!("ignoring malformed recurrence_details: {err}");
                    Self::unreadable()
                }
            },
        })
    }
}

pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Monday),
        "tuesday" | "tue" => Some(Weekday::Tuesday),
        "wednesday" | "wed" => Some(Weekday::Wednesday),
        "thursday" | "thu" => Some(Weekday::Thursday),
        "friday" | "fri" => Some(Weekday::Friday),
        "saturday" | "sat" => Some(Weekday::Saturday),
        "sunday" | "sun" => Some(Weekday::Sunday),
        _ => None,
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Monday => "Monday",
        Weekday::Tuesday => "Tuesday",
        Weekday::Wednesday => "Wednesday",
        Weekday::Thursday => "Thursday",
        Weekday::Friday => "Friday",
        Weekday::Saturday => "Saturday",
        Weekday::Sunday => "Sunday",
    }
}

/// The recurrence columns of a task record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    #[serde(rename = "recurrence_type", default)]
    pub kind: RecurrenceType,
    #[serde(rename = "recurrence_interval", default)]
    pub interval: i64,
    #[serde(rename = "recurrence_details", default)]
    pub details: RecurrenceDetails,
    #[serde(rename = "end_recurrence_date", default, with = "date_text")]
    pub end_date: Option<Date>,
    #[serde(default, with = "date_text")]
    pub next_occurrence_date: Option<Date>,
}

impl RecurrenceRule {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_recurring(&self) -> bool {
        self.kind.is_recurring()
    }

    /// "Every N units"; anything below one counts as one.
    pub fn step(&self) -> i64 {
        self.interval.max(1)
    }

    pub fn is_due_by(&self, date: Date) -> bool {
        self.is_recurring()
            && self
                .next_occurrence_date
                .is_some_and(|next_occurrence| next_occurrence <= date)
    }

    /// Drops the rule, keeping nothing but the end date for reference.
    pub fn end(&mut self) {
        self.kind = RecurrenceType::None;
        self.next_occurrence_date = None;
    }
}
