use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::utils::time::{day_end, timestamp_to_db};

/// A fully materialized row of the sessions table.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Clone)]
pub struct SessionEntity {
    pub id: i64,
    #[serde(with = "timestamp_ser")]
    pub start: NaiveDateTime,
    #[serde(with = "timestamp_ser")]
    pub end: NaiveDateTime,
    pub project: String,
    pub tags: String,
    pub notes: String,
}

impl SessionEntity {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// One display row for the list widget.
    pub fn display_line(&self, ordinal: usize) -> String {
        let mut line = format!(
            "Session {}: Start: {} | End: {}",
            ordinal,
            timestamp_to_db(self.start),
            timestamp_to_db(self.end)
        );
        if !self.project.is_empty() {
            line.push_str(" | ");
            line.push_str(&self.project);
        }
        line
    }

    /// The five editable fields as the form widget expects them.
    pub fn field_strings(&self) -> [String; 5] {
        [
            timestamp_to_db(self.start),
            timestamp_to_db(self.end),
            self.project.clone(),
            self.tags.clone(),
            self.notes.clone(),
        ]
    }

    /// Subdivides a session spanning multiple days into one part per day. Each part ends
    /// on the last representable second of its day, the next one starts at midnight.
    /// Used by daily summaries.
    pub fn split_at_midnight(self) -> Vec<SessionEntity> {
        // A reversed range can't be walked forward, report it as a single chunk.
        if self.end <= self.start {
            return vec![self];
        }

        let mut parts = Vec::new();
        let mut current = self;
        while current.start.date() != current.end.date() {
            let boundary = day_end(current.start);
            let mut head = current.clone();
            head.end = boundary;
            parts.push(head);
            current.start = boundary + Duration::seconds(1);
        }
        parts.push(current);
        parts
    }
}

mod timestamp_ser {
    use chrono::NaiveDateTime;
    use serde::{self, Serializer};

    use crate::utils::time::TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }
}

/// A partial row. Only the fields that are present are written by inserts and updates.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub project: Option<String>,
    pub tags: Option<String>,
    pub notes: Option<String>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, value: NaiveDateTime) -> Self {
        self.start = Some(value);
        self
    }

    pub fn end(mut self, value: NaiveDateTime) -> Self {
        self.end = Some(value);
        self
    }

    pub fn project(mut self, value: impl Into<String>) -> Self {
        self.project = Some(value.into());
        self
    }

    pub fn tags(mut self, value: impl Into<String>) -> Self {
        self.tags = Some(value.into());
        self
    }

    pub fn notes(mut self, value: impl Into<String>) -> Self {
        self.notes = Some(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns().is_empty()
    }

    /// Column/value pairs for the fields present in the patch, in schema order.
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        let mut columns = Vec::new();
        if let Some(start) = self.start {
            columns.push(("start", timestamp_to_db(start)));
        }
        if let Some(end) = self.end {
            columns.push(("end", timestamp_to_db(end)));
        }
        if let Some(project) = &self.project {
            columns.push(("project", project.clone()));
        }
        if let Some(tags) = &self.tags {
            columns.push(("tags", tags.clone()));
        }
        if let Some(notes) = &self.notes {
            columns.push(("notes", notes.clone()));
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn session(start: NaiveDateTime, end: NaiveDateTime) -> SessionEntity {
        SessionEntity {
            id: 1,
            start,
            end,
            project: "dummy project".into(),
            tags: String::new(),
            notes: String::new(),
        }
    }

    #[test]
    fn same_day_session_is_not_subdivided() {
        let original = session(at(2020, 1, 1, 9, 0, 0), at(2020, 1, 1, 17, 0, 0));
        assert_eq!(original.clone().split_at_midnight(), vec![original]);
    }

    #[test]
    fn multi_day_session_is_subdivided_per_day() {
        let parts =
            session(at(2020, 1, 1, 12, 0, 0), at(2020, 1, 3, 10, 0, 0)).split_at_midnight();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].start, at(2020, 1, 1, 12, 0, 0));
        assert_eq!(parts[0].end, at(2020, 1, 1, 23, 59, 59));
        assert_eq!(parts[1].start, at(2020, 1, 2, 0, 0, 0));
        assert_eq!(parts[1].end, at(2020, 1, 2, 23, 59, 59));
        assert_eq!(parts[2].start, at(2020, 1, 3, 0, 0, 0));
        assert_eq!(parts[2].end, at(2020, 1, 3, 10, 0, 0));
        for part in &parts {
            assert_eq!(part.project, "dummy project");
        }
    }

    #[test]
    fn reversed_session_stays_whole() {
        let original = session(at(2020, 1, 3, 10, 0, 0), at(2020, 1, 1, 12, 0, 0));
        assert_eq!(original.clone().split_at_midnight(), vec![original]);
    }

    #[test]
    fn patch_columns_follow_schema_order() {
        let patch = SessionPatch::new()
            .notes("some notes")
            .start(at(2018, 10, 1, 0, 0, 0));
        assert_eq!(
            patch.columns(),
            vec![
                ("start", "2018-10-01 00:00:00".to_string()),
                ("notes", "some notes".to_string()),
            ]
        );
        assert!(!patch.is_empty());
        assert!(SessionPatch::new().is_empty());
    }

    #[test]
    fn display_line_appends_project_when_present() {
        let with_project = session(at(2020, 1, 1, 9, 0, 0), at(2020, 1, 1, 10, 0, 0));
        assert_eq!(
            with_project.display_line(3),
            "Session 3: Start: 2020-01-01 09:00:00 | End: 2020-01-01 10:00:00 | dummy project"
        );

        let mut bare = session(at(2020, 1, 1, 9, 0, 0), at(2020, 1, 1, 10, 0, 0));
        bare.project = String::new();
        assert_eq!(
            bare.display_line(1),
            "Session 1: Start: 2020-01-01 09:00:00 | End: 2020-01-01 10:00:00"
        );
    }
}
