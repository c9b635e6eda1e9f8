use std::convert::TryFrom;

use rusqlite::{named_params, params_from_iter, Connection, Row};

use crate::error::AppResult;
use crate::models::time_block::TimeBlockRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        task_id,
        date,
        start_time,
        end_time,
        is_auto_scheduled,
        chunk_index,
        chunk_total,
        created_by,
        created_at
    FROM time_blocks
"#;

#[derive(Debug, Clone)]
pub struct TimeBlockRow {
    pub id: String,
    pub task_id: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub is_auto_scheduled: bool,
    pub chunk_index: Option<u32>,
    pub chunk_total: Option<u32>,
    pub created_by: String,
    pub created_at: String,
}

impl TimeBlockRow {
    pub fn from_record(record: &TimeBlockRecord) -> Self {
        Self {
            id: record.id.clone(),
            task_id: record.task_id.clone(),
            date: record.date.clone(),
            start_time: record.start_time.clone(),
            end_time: record.end_time.clone(),
            is_auto_scheduled: record.is_auto_scheduled,
            chunk_index: record.chunk_index,
            chunk_total: record.chunk_total,
            created_by: record.created_by.clone(),
            created_at: record.created_at.clone(),
        }
    }

    pub fn into_record(self) -> TimeBlockRecord {
        TimeBlockRecord {
            id: self.id,
            task_id: self.task_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            is_auto_scheduled: self.is_auto_scheduled,
            chunk_index: self.chunk_index,
            chunk_total: self.chunk_total,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<&Row<'_>> for TimeBlockRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            task_id: row.get("task_id")?,
            date: row.get("date")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            is_auto_scheduled: row.get("is_auto_scheduled")?,
            chunk_index: row.get("chunk_index")?,
            chunk_total: row.get("chunk_total")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct TimeBlockRepository;

impl TimeBlockRepository {
    pub fn insert(conn: &Connection, row: &TimeBlockRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO time_blocks (
                    id,
                    task_id,
                    date,
                    start_time,
                    end_time,
                    is_auto_scheduled,
                    chunk_index,
                    chunk_total,
                    created_by,
                    created_at
                ) VALUES (
                    :id,
                    :task_id,
                    :date,
                    :start_time,
                    :end_time,
                    :is_auto_scheduled,
                    :chunk_index,
                    :chunk_total,
                    :created_by,
                    :created_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":task_id": &row.task_id,
                ":date": &row.date,
                ":start_time": &row.start_time,
                ":end_time": &row.end_time,
                ":is_auto_scheduled": &row.is_auto_scheduled,
                ":chunk_index": &row.chunk_index,
                ":chunk_total": &row.chunk_total,
                ":created_by": &row.created_by,
                ":created_at": &row.created_at,
            },
        )?;

        Ok(())
    }

    pub fn insert_many(conn: &Connection, rows: &[TimeBlockRow]) -> AppResult<()> {
        for row in rows {
            Self::insert(conn, row)?;
        }
        Ok(())
    }

    /// Blocks dated in `[start_date, end_date)`; dates are "YYYY-MM-DD".
    pub fn list_in_range(
        conn: &Connection,
        start_date: &str,
        end_date: &str,
    ) -> AppResult<Vec<TimeBlockRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE date >= :start AND date < :end ORDER BY date ASC, start_time ASC, id ASC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map(
                named_params! {":start": start_date, ":end": end_date},
                |row| TimeBlockRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_manual_in_range(
        conn: &Connection,
        start_date: &str,
        end_date: &str,
    ) -> AppResult<Vec<TimeBlockRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE is_auto_scheduled = 0 AND date >= :start AND date < :end ORDER BY date ASC, start_time ASC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map(
                named_params! {":start": start_date, ":end": end_date},
                |row| TimeBlockRow::try_from(row),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Ids of auto blocks that a regeneration replaces: everything inside the
    /// window plus anything left over from before `today`.
    pub fn list_stale_auto_ids(
        conn: &Connection,
        window_start: &str,
        window_end: &str,
        today: &str,
    ) -> AppResult<Vec<String>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id
            FROM time_blocks
            WHERE is_auto_scheduled = 1
              AND ((date >= :start AND date < :end) OR date < :today)
            ORDER BY date ASC, id ASC
            "#,
        )?;
        let ids = stmt
            .query_map(
                named_params! {":start": window_start, ":end": window_end, ":today": today},
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn delete_by_ids(conn: &Connection, ids: &[String]) -> AppResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0;
        // SQLite caps bound parameters per statement.
        for batch in ids.chunks(500) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!("DELETE FROM time_blocks WHERE id IN ({placeholders})");
            deleted += conn.execute(&sql, params_from_iter(batch.iter()))?;
        }
        Ok(deleted)
    }
}
