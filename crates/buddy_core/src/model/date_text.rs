//! Calendar dates stored as `YYYY-MM-DD` text.
//!
//! Used as a `#[serde(with = "...")]` module for `Option<Date>` fields. A
//! blank string reads as `None`, and a full timestamp is cut down to its
//! date part so rows written by older clients still load.

use crate::error::AppError;
use serde::{Deserialize, Deserializer, Serializer};
use time::Date;
use time::macros::format_description;

pub fn parse_date(value: &str) -> Result<Date, AppError> {
    let trimmed = value.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    Date::parse(date_part, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::invalid_input(format!("date must be YYYY-MM-DD: {trimmed}")))
}

pub fn format_date(date: Date) -> Result<String, AppError> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(date) => {
            let text = format_date(*date).map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&text)
        }
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value)
            .map(Some)
            .map_err(|err| serde::de::Error::custom(err.message().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{format_date, parse_date};
    use time::{Date, Month};

    #[test]
    fn parse_date_accepts_plain_and_timestamp_forms() {
        let expected = Date::from_calendar_date(2024, Month::January, 31).unwrap();

        assert_eq!(parse_date("2024-01-31").unwrap(), expected);
        assert_eq!(parse_date(" 2024-01-31T08:30:00Z ").unwrap(), expected);
    }

    #[test]
    fn parse_date_rejects_garbage() {
        let err = parse_date("31/01/2024").unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn format_date_pads_month_and_day() {
        let date = Date::from_calendar_date(2024, Month::March, 5).unwrap();
        assert_eq!(format_date(date).unwrap(), "2024-03-05");
    }
}
