use std::collections::HashMap;
use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::schedule::{ScheduleRecord, ScheduleWindowRecord};

#[derive(Debug, Clone)]
pub struct ScheduleRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl TryFrom<&Row<'_>> for ScheduleRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleWindowRow {
    pub schedule_id: String,
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
}

impl ScheduleWindowRow {
    pub fn into_record(self) -> ScheduleWindowRecord {
        ScheduleWindowRecord {
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

impl TryFrom<&Row<'_>> for ScheduleWindowRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            schedule_id: row.get("schedule_id")?,
            day_of_week: row.get("day_of_week")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
        })
    }
}

pub struct ScheduleRepository;

impl ScheduleRepository {
    /// Inserts the schedule and its windows. Callers wrap this in a
    /// transaction so a bad window leaves no half-written schedule.
    pub fn insert(conn: &Connection, record: &ScheduleRecord) -> AppResult<()> {
        conn.execute(
            "INSERT INTO schedules (id, name, created_at) VALUES (:id, :name, :created_at)",
            named_params! {
                ":id": &record.id,
                ":name": &record.name,
                ":created_at": &record.created_at,
            },
        )?;

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO schedule_windows (schedule_id, day_of_week, start_time, end_time)
            VALUES (:schedule_id, :day_of_week, :start_time, :end_time)
            "#,
        )?;
        for window in &record.windows {
            stmt.execute(named_params! {
                ":schedule_id": &record.id,
                ":day_of_week": window.day_of_week,
                ":start_time": &window.start_time,
                ":end_time": &window.end_time,
            })?;
        }

        Ok(())
    }

    pub fn exists(conn: &Connection, id: &str) -> AppResult<bool> {
        let found = conn
            .query_row("SELECT 1 FROM schedules WHERE id = ?1", [id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn list_windows(conn: &Connection) -> AppResult<Vec<ScheduleWindowRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT schedule_id, day_of_week, start_time, end_time
            FROM schedule_windows
            ORDER BY schedule_id ASC, day_of_week ASC, start_time ASC
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| ScheduleWindowRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<ScheduleRecord>> {
        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM schedules ORDER BY created_at ASC, id ASC")?;
        let schedules = stmt
            .query_map([], |row| ScheduleRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut windows: HashMap<String, Vec<ScheduleWindowRecord>> = HashMap::new();
        for row in Self::list_windows(conn)? {
            windows
                .entry(row.schedule_id.clone())
                .or_default()
                .push(row.into_record());
        }

        Ok(schedules
            .into_iter()
            .map(|schedule| ScheduleRecord {
                windows: windows.remove(&schedule.id).unwrap_or_default(),
                id: schedule.id,
                name: schedule.name,
                created_at: schedule.created_at,
            })
            .collect())
    }
}
