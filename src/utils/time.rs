use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone};

/// This is the standard way of writing a timestamp into the database in stint.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn timestamp_to_db(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn timestamp_from_db(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .with_context(|| format!("Can't parse {value:?} as a session timestamp"))
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}

/// Last representable moment of the day `value` falls on. Timestamps have second
/// resolution, so this is 23:59:59.
pub fn day_end(value: NaiveDateTime) -> NaiveDateTime {
    value
        .date()
        .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap())
}
