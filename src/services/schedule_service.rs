use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::repositories::schedule_repository::ScheduleRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::schedule::{ScheduleCreateInput, ScheduleRecord, ScheduleWindowRecord};
use crate::services::schedule_utils;

/// CRUD for named weekly availability patterns.
pub struct ScheduleService {
    db: DbPool,
}

impl ScheduleService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_schedule(&self, input: ScheduleCreateInput) -> AppResult<ScheduleRecord> {
        self.db
            .with_immediate_transaction(|tx| Self::create_schedule_in(tx, input))
    }

    /// Stores the schedule row and its windows; callers supply the transaction.
    pub(crate) fn create_schedule_in(
        conn: &Connection,
        input: ScheduleCreateInput,
    ) -> AppResult<ScheduleRecord> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("schedule name must not be empty"));
        }

        let windows = input
            .windows
            .into_iter()
            .map(normalize_window)
            .collect::<AppResult<Vec<_>>>()?;

        let record = ScheduleRecord {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: name.to_string(),
            windows,
            created_at: Utc::now().to_rfc3339(),
        };

        ScheduleRepository::insert(conn, &record)?;

        info!(
            target: "app::tasks",
            schedule_id = %record.id,
            windows = record.windows.len(),
            "schedule created"
        );
        Ok(record)
    }

    pub fn list_schedules(&self) -> AppResult<Vec<ScheduleRecord>> {
        let schedules = self.db.with_connection(ScheduleRepository::list_all)?;
        debug!(target: "app::tasks", count = schedules.len(), "schedules listed");
        Ok(schedules)
    }
}

fn normalize_window(window: ScheduleWindowRecord) -> AppResult<ScheduleWindowRecord> {
    if window.day_of_week > 6 {
        return Err(AppError::validation(format!(
            "day of week must be 0 (Sunday) to 6 (Saturday), got {}",
            window.day_of_week
        )));
    }
    let start = schedule_utils::parse_hhmm(&window.start_time)?;
    let end = schedule_utils::parse_hhmm(&window.end_time)?;
    if start >= end {
        return Err(AppError::validation(format!(
            "schedule window {}-{} must end after it starts",
            window.start_time, window.end_time
        )));
    }

    Ok(ScheduleWindowRecord {
        day_of_week: window.day_of_week,
        start_time: schedule_utils::format_hhmm(start),
        end_time: schedule_utils::format_hhmm(end),
    })
}
