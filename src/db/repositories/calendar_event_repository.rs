use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::{AppError, AppResult};
use crate::models::calendar::{BusyStatus, CalendarEventRecord};

#[derive(Debug, Clone)]
pub struct CalendarEventRow {
    pub id: String,
    pub title: String,
    pub start_at: String,
    pub end_at: String,
    pub busy_status: String,
}

impl CalendarEventRow {
    pub fn from_record(record: &CalendarEventRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            start_at: record.start_at.clone(),
            end_at: record.end_at.clone(),
            busy_status: record.busy_status.as_str().to_string(),
        }
    }

    pub fn into_record(self) -> AppResult<CalendarEventRecord> {
        let busy_status = BusyStatus::parse(&self.busy_status).ok_or_else(|| {
            AppError::validation(format!(
                "calendar event {} has unknown busy status {}",
                self.id, self.busy_status
            ))
        })?;

        Ok(CalendarEventRecord {
            id: self.id,
            title: self.title,
            start_at: self.start_at,
            end_at: self.end_at,
            busy_status,
        })
    }
}

impl TryFrom<&Row<'_>> for CalendarEventRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            start_at: row.get("start_at")?,
            end_at: row.get("end_at")?,
            busy_status: row.get("busy_status")?,
        })
    }
}

pub struct CalendarEventRepository;

impl CalendarEventRepository {
    pub fn insert(conn: &Connection, row: &CalendarEventRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO calendar_events (id, title, start_at, end_at, busy_status)
                VALUES (:id, :title, :start_at, :end_at, :busy_status)
            "#,
            named_params! {
                ":id": &row.id,
                ":title": &row.title,
                ":start_at": &row.start_at,
                ":end_at": &row.end_at,
                ":busy_status": &row.busy_status,
            },
        )?;
        Ok(())
    }

    /// BUSY events overlapping `[window_start, window_end)`. Bounds are UTC
    /// RFC 3339 strings, which order the same as the instants they encode.
    pub fn list_busy_overlapping(
        conn: &Connection,
        window_start: &str,
        window_end: &str,
    ) -> AppResult<Vec<CalendarEventRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, title, start_at, end_at, busy_status
            FROM calendar_events
            WHERE busy_status = :busy
              AND start_at < :window_end
              AND end_at > :window_start
            ORDER BY start_at ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":busy": BusyStatus::Busy.as_str(),
                    ":window_start": window_start,
                    ":window_end": window_end,
                },
                |row| CalendarEventRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
