use chrono::Utc;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::db::repositories::goal_repository::{GoalRepository, GoalRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::goal::{GoalCreateInput, GoalRecord};
use crate::services::schedule_utils;

pub struct GoalService {
    db: DbPool,
}

impl GoalService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_goal(&self, input: GoalCreateInput) -> AppResult<GoalRecord> {
        self.db.with_connection(|conn| Self::create_goal_in(conn, input))
    }

    /// Validates and stores a goal on the caller's connection or transaction.
    pub(crate) fn create_goal_in(
        conn: &Connection,
        input: GoalCreateInput,
    ) -> AppResult<GoalRecord> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("goal title must not be empty"));
        }

        let target_date = schedule_utils::parse_optional_datetime(input.target_date.as_deref())?
            .map(schedule_utils::format_datetime);

        let record = GoalRecord {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title: title.to_string(),
            target_date,
            created_at: Utc::now().to_rfc3339(),
        };

        GoalRepository::insert(conn, &GoalRow::from_record(&record))?;
        info!(target: "app::tasks", goal_id = %record.id, "goal created");
        Ok(record)
    }

    pub fn get_goal(&self, id: &str) -> AppResult<GoalRecord> {
        self.db
            .with_connection(|conn| GoalRepository::find_by_id(conn, id))?
            .map(GoalRow::into_record)
            .ok_or_else(AppError::not_found)
    }
}
