use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::info;

use crate::utils::time::timestamp_from_db;

use super::entities::{SessionEntity, SessionPatch};
use super::filter::{SessionFilter, SELECTION_QUERY};

pub const SESSIONS_TABLE: &str = "sessions";

const SCHEMA: &str = "CREATE TABLE sessions (\
     id INTEGER PRIMARY KEY AUTOINCREMENT,\
     start TEXT,\
     end TEXT,\
     project TEXT,\
     tags TEXT,\
     notes TEXT)";

const COLUMNS: [&str; 6] = ["id", "start", "end", "project", "tags", "notes"];

type RawRow = (
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// The persistent session table plus the selection produced by the last filter run.
///
/// The schema is fixed. A file whose table or columns don't match is refused instead of
/// being altered.
#[derive(Debug)]
pub struct SessionLog {
    conn: Connection,
    filter: SessionFilter,
    selection: Vec<SessionEntity>,
}

impl SessionLog {
    /// Creates a new database file. Refuses to touch a file that already exists.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            bail!("The file {} already exists", path.display());
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Can't create a database at {}", path.display()))?;
        conn.execute_batch(SCHEMA)?;
        info!("Created database {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// Opens an existing database file and verifies its schema.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("The database {} was not found", path.display());
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Can't open the database at {}", path.display()))?;
        Self::verify_schema(&conn)?;
        info!("Loaded database {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// An ephemeral store. Mostly useful in tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            filter: SessionFilter::default(),
            selection: Vec::new(),
        }
    }

    fn verify_schema(conn: &Connection) -> Result<()> {
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [SESSIONS_TABLE],
            |row| row.get(0),
        )?;
        if tables == 0 {
            bail!("Database does not contain the sessions table");
        }

        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map([SESSIONS_TABLE], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if names != COLUMNS {
            bail!("The sessions table has unexpected columns");
        }
        Ok(())
    }

    /// Inserts a row with only the fields present in the patch. Returns the new row id.
    pub fn add_row(&mut self, patch: &SessionPatch) -> Result<i64> {
        let columns = patch.columns();
        if columns.is_empty() {
            self.conn.execute("INSERT INTO sessions DEFAULT VALUES", [])?;
        } else {
            // Column names come from the fixed set in SessionPatch, values go through
            // placeholders.
            let names = columns
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=columns.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!("INSERT INTO sessions ({names}) VALUES ({placeholders})");
            self.conn.execute(
                &sql,
                params_from_iter(columns.into_iter().map(|(_, value)| value)),
            )?;
        }
        Ok(self.conn.last_insert_rowid())
    }

    /// Updates the fields present in the patch. Updating a row that no longer exists
    /// affects zero rows and is not an error.
    pub fn update_row(&mut self, id: i64, patch: &SessionPatch) -> Result<usize> {
        let columns = patch.columns();
        if columns.is_empty() {
            return Ok(0);
        }
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{name} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE sessions SET {assignments} WHERE id = ?{}",
            columns.len() + 1
        );

        let mut values = columns
            .into_iter()
            .map(|(_, value)| Value::Text(value))
            .collect::<Vec<_>>();
        values.push(Value::Integer(id));
        Ok(self.conn.execute(&sql, params_from_iter(values))?)
    }

    /// Deletes a batch of rows by id. Returns the number of rows that actually existed.
    pub fn delete_rows(&mut self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("DELETE FROM sessions WHERE id IN ({placeholders})");
        Ok(self.conn.execute(&sql, params_from_iter(ids.iter()))?)
    }

    pub fn filter(&self) -> &SessionFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: SessionFilter) {
        self.filter = filter;
    }

    /// Reruns the current filter and replaces the selection. Returns its size.
    pub fn refresh(&mut self) -> Result<usize> {
        let params = self.filter.params();
        let mut stmt = self.conn.prepare(SELECTION_QUERY)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), Self::raw_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut selection = Vec::with_capacity(rows.len());
        for row in rows {
            selection.push(Self::materialize(row)?);
        }
        self.selection = selection;
        Ok(self.selection.len())
    }

    /// Resets the filter to match everything and reruns it.
    pub fn select_all(&mut self) -> Result<usize> {
        self.filter = SessionFilter::default();
        self.refresh()
    }

    /// The selection produced by the last filter run. This is snapshot data, mutating
    /// operations don't touch it until the next [refresh](Self::refresh).
    pub fn selected(&self) -> &[SessionEntity] {
        &self.selection
    }

    /// Display rows for the list widget, one per selected session.
    pub fn format_selected(&self) -> Vec<String> {
        self.selection
            .iter()
            .enumerate()
            .map(|(i, session)| session.display_line(i + 1))
            .collect()
    }

    pub fn get_row(&self, id: i64) -> Result<Option<SessionEntity>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, start, end, project, tags, notes FROM sessions WHERE id = ?1",
                [id],
                Self::raw_row,
            )
            .optional()?;
        row.map(Self::materialize).transpose()
    }

    /// Total tracked time over the current selection.
    pub fn total_time(&self) -> Duration {
        self.selection
            .iter()
            .map(SessionEntity::duration)
            .fold(Duration::zero(), |acc, v| acc + v)
    }

    /// Tracked time per day over the current selection. Sessions spanning midnight count
    /// towards every day they touch.
    pub fn daily_totals(&self) -> Vec<(NaiveDate, Duration)> {
        let mut totals = BTreeMap::new();
        for session in self.selection.iter().cloned() {
            for part in session.split_at_midnight() {
                let total = totals
                    .entry(part.start.date())
                    .or_insert_with(Duration::zero);
                *total = *total + part.duration();
            }
        }
        totals.into_iter().collect()
    }

    fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn materialize((id, start, end, project, tags, notes): RawRow) -> Result<SessionEntity> {
        Ok(SessionEntity {
            id,
            start: Self::materialize_timestamp(id, "start", start)?,
            end: Self::materialize_timestamp(id, "end", end)?,
            project: project.unwrap_or_default(),
            tags: tags.unwrap_or_default(),
            notes: notes.unwrap_or_default(),
        })
    }

    fn materialize_timestamp(
        id: i64,
        column: &str,
        value: Option<String>,
    ) -> Result<NaiveDateTime> {
        let Some(value) = value else {
            bail!("Session {id} has no {column} timestamp");
        };
        timestamp_from_db(&value).with_context(|| format!("Session {id} has a broken {column}"))
    }
}
