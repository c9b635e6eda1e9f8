use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::repositories::goal_repository::GoalRepository;
use crate::db::repositories::schedule_repository::ScheduleRepository;
use crate::db::repositories::task_repository::{TaskRepository, TaskRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::task::{TaskCreateInput, TaskPriority, TaskRecord, VALID_STATUSES};
use crate::services::schedule_utils;

const MAX_ESTIMATED_MINUTES: i64 = 60 * 24 * 30;

pub struct TaskService {
    db: DbPool,
}

impl TaskService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_task(&self, input: TaskCreateInput) -> AppResult<TaskRecord> {
        self.db.with_connection(|conn| Self::create_task_in(conn, input))
    }

    /// Validates and stores a task on the caller's connection or transaction.
    /// Referenced schedules and goals must already exist there.
    pub(crate) fn create_task_in(
        conn: &Connection,
        input: TaskCreateInput,
    ) -> AppResult<TaskRecord> {
        let now = Utc::now().to_rfc3339();
        let record = TaskRecord {
            id: normalize_optional_string(input.id)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            title: normalize_title(&input.title)?,
            description: normalize_optional_string(input.description),
            status: normalize_status(input.status)?,
            priority: normalize_priority(input.priority)?,
            due_at: normalize_datetime_opt(input.due_at)?,
            estimated_minutes: normalize_estimated_minutes(input.estimated_minutes)?,
            auto_schedule: input.auto_schedule.unwrap_or(false),
            is_hard_deadline: input.is_hard_deadline.unwrap_or(false),
            min_chunk_minutes: normalize_min_chunk(input.min_chunk_minutes)?,
            schedule_id: normalize_optional_string(input.schedule_id),
            goal_id: normalize_optional_string(input.goal_id),
            deleted_at: None,
            created_at: now.clone(),
            updated_at: now,
        };

        if record.auto_schedule && record.estimated_minutes.is_none() {
            return Err(AppError::validation(
                "auto-scheduled tasks need an estimated duration",
            ));
        }

        if let Some(schedule_id) = record.schedule_id.as_deref() {
            if !ScheduleRepository::exists(conn, schedule_id)? {
                return Err(AppError::validation(format!(
                    "schedule {schedule_id} does not exist"
                )));
            }
        }
        if let Some(goal_id) = record.goal_id.as_deref() {
            if GoalRepository::find_by_id(conn, goal_id)?.is_none() {
                return Err(AppError::validation(format!("goal {goal_id} does not exist")));
            }
        }
        TaskRepository::insert(conn, &TaskRow::from_record(&record))?;

        info!(target: "app::tasks", task_id = %record.id, "task created");
        Ok(record)
    }

    pub fn get_task(&self, id: &str) -> AppResult<TaskRecord> {
        let row = self
            .db
            .with_connection(|conn| TaskRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)?;
        debug!(target: "app::tasks", task_id = %row.id, "task fetched");
        Ok(row.into_record())
    }

    pub fn list_tasks(&self) -> AppResult<Vec<TaskRecord>> {
        let rows = self.db.with_connection(TaskRepository::list_all)?;
        let tasks = rows.into_iter().map(TaskRow::into_record).collect::<Vec<_>>();
        debug!(target: "app::tasks", count = tasks.len(), "tasks listed");
        Ok(tasks)
    }

    /// Marks the task deleted; it stays in the store but is never scheduled.
    pub fn delete_task(&self, id: &str) -> AppResult<()> {
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(|conn| TaskRepository::soft_delete(conn, id, &now))?;
        info!(target: "app::tasks", task_id = %id, "task deleted");
        Ok(())
    }
}

fn normalize_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if trimmed.chars().count() > 160 {
        return Err(AppError::validation("title must be at most 160 characters"));
    }
    Ok(trimmed.to_string())
}

fn normalize_status(status: Option<String>) -> AppResult<String> {
    let value = status.unwrap_or_else(|| "todo".to_string()).to_lowercase();
    if VALID_STATUSES.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(AppError::validation(format!("unknown status {value}")))
    }
}

fn normalize_priority(priority: Option<String>) -> AppResult<String> {
    match priority {
        None => Ok(TaskPriority::Medium.as_str().to_string()),
        Some(value) => TaskPriority::parse(&value)
            .map(|priority| priority.as_str().to_string())
            .ok_or_else(|| AppError::validation(format!("unknown priority {value}"))),
    }
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|val| {
        let trimmed = val.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// Stores instants as UTC so they compare correctly as text.
fn normalize_datetime_opt(value: Option<String>) -> AppResult<Option<String>> {
    let parsed = schedule_utils::parse_optional_datetime(value.as_deref())?;
    Ok(parsed.map(schedule_utils::format_datetime))
}

fn normalize_estimated_minutes(value: Option<i64>) -> AppResult<Option<i64>> {
    match value {
        Some(minutes) if minutes <= 0 => Err(AppError::validation(
            "estimated minutes must be greater than 0",
        )),
        Some(minutes) if minutes > MAX_ESTIMATED_MINUTES => Err(AppError::validation(
            "estimated minutes must not exceed 30 days",
        )),
        other => Ok(other),
    }
}

fn normalize_min_chunk(value: Option<i64>) -> AppResult<Option<i64>> {
    match value {
        Some(minutes) if minutes < 0 => Err(AppError::validation(
            "minimum chunk minutes must not be negative",
        )),
        Some(0) | None => Ok(None),
        other => Ok(other),
    }
}
