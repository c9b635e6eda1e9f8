use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::repositories::task_repository::TaskRepository;
use crate::db::repositories::time_block_repository::{TimeBlockRepository, TimeBlockRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::time_block::{ManualBlockInput, TimeBlockRecord, CREATED_BY_USER};
use crate::services::schedule_utils;

pub struct TimeBlockService {
    db: DbPool,
}

impl TimeBlockService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Records a user-placed block. The auto-scheduler treats it as busy time
    /// and counts it against the linked task's remaining estimate.
    pub fn create_manual_block(&self, input: ManualBlockInput) -> AppResult<TimeBlockRecord> {
        self.db
            .with_connection(|conn| Self::create_manual_block_in(conn, input))
    }

    pub(crate) fn create_manual_block_in(
        conn: &Connection,
        input: ManualBlockInput,
    ) -> AppResult<TimeBlockRecord> {
        let date = schedule_utils::parse_date(&input.date)?;
        let start = schedule_utils::parse_hhmm(&input.start_time)?;
        let end = schedule_utils::parse_hhmm(&input.end_time)?;
        if start >= end {
            return Err(AppError::validation(format!(
                "time block {}-{} must end after it starts",
                input.start_time, input.end_time
            )));
        }

        let record = TimeBlockRecord {
            id: Uuid::new_v4().to_string(),
            task_id: input.task_id.filter(|id| !id.trim().is_empty()),
            date: schedule_utils::format_date(date),
            start_time: schedule_utils::format_hhmm(start),
            end_time: schedule_utils::format_hhmm(end),
            is_auto_scheduled: false,
            chunk_index: None,
            chunk_total: None,
            created_by: CREATED_BY_USER.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        if let Some(task_id) = record.task_id.as_deref() {
            if TaskRepository::find_by_id(conn, task_id)?.is_none() {
                return Err(AppError::validation(format!("task {task_id} does not exist")));
            }
        }
        TimeBlockRepository::insert(conn, &TimeBlockRow::from_record(&record))?;

        info!(
            target: "app::tasks",
            block_id = %record.id,
            date = %record.date,
            "manual time block created"
        );
        Ok(record)
    }

    /// Every block, manual or automatic, dated in `[start, end)`.
    pub fn list_blocks_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<TimeBlockRecord>> {
        let start = schedule_utils::format_date(start);
        let end = schedule_utils::format_date(end);
        let rows = self
            .db
            .with_connection(|conn| TimeBlockRepository::list_in_range(conn, &start, &end))?;
        debug!(target: "app::tasks", count = rows.len(), "time blocks listed");
        Ok(rows.into_iter().map(TimeBlockRow::into_record).collect())
    }
}
