use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::db::repositories::calendar_event_repository::{
    CalendarEventRepository, CalendarEventRow,
};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::calendar::{BusyStatus, CalendarEventInput, CalendarEventRecord};
use crate::services::schedule_utils;

/// Stores calendar events produced by feed imports.
pub struct CalendarService {
    db: DbPool,
}

impl CalendarService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn add_event(&self, input: CalendarEventInput) -> AppResult<CalendarEventRecord> {
        self.db.with_connection(|conn| Self::add_event_in(conn, input))
    }

    pub(crate) fn add_event_in(
        conn: &Connection,
        input: CalendarEventInput,
    ) -> AppResult<CalendarEventRecord> {
        let start_at = schedule_utils::parse_datetime(&input.start_at)?;
        let end_at = schedule_utils::parse_datetime(&input.end_at)?;
        if end_at <= start_at {
            return Err(AppError::validation(format!(
                "calendar event {} must end after it starts",
                input.title
            )));
        }

        let record = CalendarEventRecord {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: input.title,
            start_at: schedule_utils::format_datetime(start_at),
            end_at: schedule_utils::format_datetime(end_at),
            busy_status: input.busy_status.unwrap_or(BusyStatus::Busy),
        };

        CalendarEventRepository::insert(conn, &CalendarEventRow::from_record(&record))?;
        info!(
            target: "app::tasks",
            event_id = %record.id,
            status = record.busy_status.as_str(),
            "calendar event stored"
        );
        Ok(record)
    }
}
