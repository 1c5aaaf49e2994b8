use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};
use now::DateTimeNow;

use crate::store::filter::SessionFilter;
use crate::utils::time::{next_day_start, TIMESTAMP_FORMAT};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Filter flags shared by the one-shot commands.
#[derive(Debug, clap::Args)]
pub struct FilterArgs {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"2025-03-16 12:00:00\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"2025-03-16 12:00:00\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Widen the range to whole days. For example if start and end are both 15/03/2025 this option selects the whole day"
    )]
    treat_as_days: bool,
    #[arg(short, long, help = "Keep only sessions whose project contains this text")]
    project: Option<String>,
    #[arg(short, long, help = "Keep only sessions whose tags contain this text")]
    tags: Option<String>,
    #[arg(short, long, help = "Keep only sessions whose notes contain this text")]
    notes: Option<String>,
}

/// Turns the filter flags into a store filter. Bounds that weren't given stay at the
/// match-everything defaults.
pub fn build_filter(
    FilterArgs {
        start_date,
        end_date,
        date_style,
        treat_as_days,
        project,
        tags,
        notes,
    }: FilterArgs,
) -> Result<SessionFilter> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();

    let mut start = start_date
        .map(|s| parse_moment(&s, "start", now, dialect))
        .transpose()?;
    let mut end = end_date
        .map(|s| parse_moment(&s, "end", now, dialect))
        .transpose()?;

    if treat_as_days {
        start = start.map(|v| v.beginning_of_day());
        end = end.map(|v| next_day_start(v) - Duration::seconds(1));
    }

    let mut filter = SessionFilter::default();
    if let Some(start) = start {
        filter.start = start.naive_local();
    }
    if let Some(end) = end {
        filter.end = end.naive_local();
    }
    filter.project = project.unwrap_or_default();
    filter.tags = tags.unwrap_or_default();
    filter.notes = notes.unwrap_or_default();
    Ok(filter)
}

/// A range bound is either a canonical timestamp or an english date phrase.
fn parse_moment(
    value: &str,
    bound: &str,
    now: DateTime<Local>,
    dialect: chrono_english::Dialect,
) -> Result<DateTime<Local>> {
    if let Ok(v) = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        if let Some(v) = Local.from_local_datetime(&v).earliest() {
            return Ok(v);
        }
    }
    match parse_date_string(value, now, dialect) {
        Ok(v) => Ok(v.with_timezone(&Local)),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate {bound} date {e}"),
            )
            .into()),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use crate::store::filter::{MAX_TIMESTAMP, MIN_TIMESTAMP};
    use crate::utils::time::timestamp_to_db;

    use super::*;

    fn args() -> FilterArgs {
        FilterArgs {
            start_date: None,
            end_date: None,
            date_style: DateStyle::Uk,
            treat_as_days: false,
            project: None,
            tags: None,
            notes: None,
        }
    }

    #[test]
    fn missing_bounds_stay_unfiltered() -> Result<()> {
        let filter = build_filter(args())?;
        assert_eq!(timestamp_to_db(filter.start), MIN_TIMESTAMP);
        assert_eq!(timestamp_to_db(filter.end), MAX_TIMESTAMP);
        assert!(filter.project.is_empty());
        Ok(())
    }

    #[test]
    fn canonical_timestamps_are_taken_verbatim() -> Result<()> {
        let mut input = args();
        input.start_date = Some("2018-09-01 08:15:00".to_string());
        input.end_date = Some("2018-11-01 17:00:00".to_string());
        input.project = Some("dummy project".to_string());

        let filter = build_filter(input)?;
        assert_eq!(timestamp_to_db(filter.start), "2018-09-01 08:15:00");
        assert_eq!(timestamp_to_db(filter.end), "2018-11-01 17:00:00");
        assert_eq!(filter.project, "dummy project");
        Ok(())
    }

    #[test]
    fn days_flag_widens_to_whole_days() -> Result<()> {
        let mut input = args();
        input.start_date = Some("2018-09-01 08:15:00".to_string());
        input.end_date = Some("2018-09-01 17:00:00".to_string());
        input.treat_as_days = true;

        let filter = build_filter(input)?;
        assert_eq!(timestamp_to_db(filter.start), "2018-09-01 00:00:00");
        assert_eq!(timestamp_to_db(filter.end), "2018-09-01 23:59:59");
        Ok(())
    }

    #[test]
    fn unparseable_bound_is_rejected() {
        let mut input = args();
        input.start_date = Some("not a date at all".to_string());
        assert!(build_filter(input).is_err());
    }
}
