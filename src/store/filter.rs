use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::utils::time::{timestamp_from_db, timestamp_to_db};

/// Lower bound of the match-everything filter.
pub const MIN_TIMESTAMP: &str = "0000-01-01 00:00:00";
/// Upper bound of the match-everything filter.
pub const MAX_TIMESTAMP: &str = "9999-12-31 23:59:59";

/// The filter predicate over the sessions table. Dates constrain the range a session
/// must lie in entirely, the text fields are substring matches on their columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFilter {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub project: String,
    pub tags: String,
    pub notes: String,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            start: timestamp_from_db(MIN_TIMESTAMP).expect("Minimum timestamp is well formed"),
            end: timestamp_from_db(MAX_TIMESTAMP).expect("Maximum timestamp is well formed"),
            project: String::new(),
            tags: String::new(),
            notes: String::new(),
        }
    }
}

/// The translated predicate. Everything is parameterized, filter text never reaches the
/// statement itself. `IFNULL` keeps rows with NULL text columns matchable by the empty
/// substring.
pub const SELECTION_QUERY: &str = "SELECT id, start, end, project, tags, notes FROM sessions \
     WHERE start >= ?1 AND end <= ?2 \
     AND IFNULL(project, '') LIKE '%' || ?3 || '%' \
     AND IFNULL(tags, '') LIKE '%' || ?4 || '%' \
     AND IFNULL(notes, '') LIKE '%' || ?5 || '%' \
     ORDER BY start";

impl SessionFilter {
    /// Statement parameters for [SELECTION_QUERY], in placeholder order.
    pub fn params(&self) -> [String; 5] {
        self.field_strings()
    }

    /// The five fields as the form widget edits them.
    pub fn field_strings(&self) -> [String; 5] {
        [
            timestamp_to_db(self.start),
            timestamp_to_db(self.end),
            self.project.clone(),
            self.tags.clone(),
            self.notes.clone(),
        ]
    }

    /// Builds a filter back from interactively edited fields. The date fields must be in
    /// the canonical timestamp format, the rest is taken verbatim.
    pub fn from_field_strings(fields: &[String; 5]) -> Result<Self> {
        Ok(Self {
            start: timestamp_from_db(&fields[0]).context("Range start is not a valid timestamp")?,
            end: timestamp_from_db(&fields[1]).context("Range end is not a valid timestamp")?,
            project: fields[2].clone(),
            tags: fields[3].clone(),
            notes: fields[4].clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_spans_everything() {
        let filter = SessionFilter::default();
        let params = filter.params();
        assert_eq!(params[0], MIN_TIMESTAMP);
        assert_eq!(params[1], MAX_TIMESTAMP);
        assert!(params[2..].iter().all(|v| v.is_empty()));
    }

    #[test]
    fn fields_roundtrip() {
        let fields = [
            "2018-09-01 00:00:00".to_string(),
            "2018-11-01 00:00:00".to_string(),
            "dummy project".to_string(),
            String::new(),
            "some notes".to_string(),
        ];
        let filter = SessionFilter::from_field_strings(&fields).unwrap();
        assert_eq!(filter.field_strings(), fields);
    }

    #[test]
    fn malformed_date_field_is_rejected() {
        let mut fields = SessionFilter::default().field_strings();
        fields[1] = "tomorrow".to_string();
        let err = SessionFilter::from_field_strings(&fields).unwrap_err();
        assert!(err.to_string().contains("Range end"));
    }
}
