use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::auto_schedule::TaskToSchedule;
use crate::models::task::{TaskPriority, TaskRecord, SCHEDULABLE_STATUSES};
use crate::services::schedule_utils;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        title,
        description,
        status,
        priority,
        due_at,
        estimated_minutes,
        auto_schedule,
        is_hard_deadline,
        min_chunk_minutes,
        schedule_id,
        goal_id,
        deleted_at,
        created_at,
        updated_at
    FROM tasks
"#;

/// Minutes covered by a block's "HH:MM" bounds.
const BLOCK_MINUTES_SQL: &str = r#"
    (CAST(substr(b.end_time, 1, 2) AS INTEGER) * 60 + CAST(substr(b.end_time, 4, 2) AS INTEGER))
    - (CAST(substr(b.start_time, 1, 2) AS INTEGER) * 60 + CAST(substr(b.start_time, 4, 2) AS INTEGER))
"#;

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub due_at: Option<String>,
    pub estimated_minutes: Option<i64>,
    pub auto_schedule: bool,
    pub is_hard_deadline: bool,
    pub min_chunk_minutes: Option<i64>,
    pub schedule_id: Option<String>,
    pub goal_id: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            status: record.status.clone(),
            priority: record.priority.clone(),
            due_at: record.due_at.clone(),
            estimated_minutes: record.estimated_minutes,
            auto_schedule: record.auto_schedule,
            is_hard_deadline: record.is_hard_deadline,
            min_chunk_minutes: record.min_chunk_minutes,
            schedule_id: record.schedule_id.clone(),
            goal_id: record.goal_id.clone(),
            deleted_at: record.deleted_at.clone(),
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }

    pub fn into_record(self) -> TaskRecord {
        TaskRecord {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_at: self.due_at,
            estimated_minutes: self.estimated_minutes,
            auto_schedule: self.auto_schedule,
            is_hard_deadline: self.is_hard_deadline,
            min_chunk_minutes: self.min_chunk_minutes,
            schedule_id: self.schedule_id,
            goal_id: self.goal_id,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<&Row<'_>> for TaskRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            status: row.get("status")?,
            priority: row.get("priority")?,
            due_at: row.get("due_at")?,
            estimated_minutes: row.get("estimated_minutes")?,
            auto_schedule: row.get("auto_schedule")?,
            is_hard_deadline: row.get("is_hard_deadline")?,
            min_chunk_minutes: row.get("min_chunk_minutes")?,
            schedule_id: row.get("schedule_id")?,
            goal_id: row.get("goal_id")?,
            deleted_at: row.get("deleted_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// An auto-schedulable task joined with its manual block minutes and goal
/// deadline.
#[derive(Debug, Clone)]
pub struct SchedulableTaskRow {
    pub id: String,
    pub title: String,
    pub priority: String,
    pub due_at: Option<String>,
    pub is_hard_deadline: bool,
    pub estimated_minutes: i64,
    pub min_chunk_minutes: Option<i64>,
    pub schedule_id: Option<String>,
    pub scheduled_minutes: i64,
    pub goal_target_date: Option<String>,
}

impl TryFrom<&Row<'_>> for SchedulableTaskRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            priority: row.get("priority")?,
            due_at: row.get("due_at")?,
            is_hard_deadline: row.get("is_hard_deadline")?,
            estimated_minutes: row.get("estimated_minutes")?,
            min_chunk_minutes: row.get("min_chunk_minutes")?,
            schedule_id: row.get("schedule_id")?,
            scheduled_minutes: row.get("scheduled_minutes")?,
            goal_target_date: row.get("goal_target_date")?,
        })
    }
}

impl SchedulableTaskRow {
    pub fn into_task(self) -> AppResult<TaskToSchedule> {
        let priority = TaskPriority::parse(&self.priority).unwrap_or_else(|| {
            warn!(
                target: "app::db",
                task_id = %self.id,
                priority = %self.priority,
                "unknown priority, treating as medium"
            );
            TaskPriority::Medium
        });

        Ok(TaskToSchedule {
            priority,
            due_at: schedule_utils::parse_optional_datetime(self.due_at.as_deref())?,
            goal_deadline: schedule_utils::parse_optional_datetime(
                self.goal_target_date.as_deref(),
            )?,
            id: self.id,
            title: self.title,
            estimated_minutes: self.estimated_minutes,
            is_hard_deadline: self.is_hard_deadline,
            min_chunk_minutes: self.min_chunk_minutes,
            schedule_id: self.schedule_id,
            scheduled_minutes: self.scheduled_minutes,
        })
    }
}

pub struct TaskRepository;

impl TaskRepository {
    pub fn insert(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id,
                    title,
                    description,
                    status,
                    priority,
                    due_at,
                    estimated_minutes,
                    auto_schedule,
                    is_hard_deadline,
                    min_chunk_minutes,
                    schedule_id,
                    goal_id,
                    deleted_at,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :title,
                    :description,
                    :status,
                    :priority,
                    :due_at,
                    :estimated_minutes,
                    :auto_schedule,
                    :is_hard_deadline,
                    :min_chunk_minutes,
                    :schedule_id,
                    :goal_id,
                    :deleted_at,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":title": &row.title,
                ":description": &row.description,
                ":status": &row.status,
                ":priority": &row.priority,
                ":due_at": &row.due_at,
                ":estimated_minutes": &row.estimated_minutes,
                ":auto_schedule": &row.auto_schedule,
                ":is_hard_deadline": &row.is_hard_deadline,
                ":min_chunk_minutes": &row.min_chunk_minutes,
                ":schedule_id": &row.schedule_id,
                ":goal_id": &row.goal_id,
                ":deleted_at": &row.deleted_at,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn soft_delete(conn: &Connection, id: &str, deleted_at: &str) -> AppResult<()> {
        let affected = conn.execute(
            "UPDATE tasks SET deleted_at = :deleted_at, updated_at = :deleted_at WHERE id = :id AND deleted_at IS NULL",
            named_params! {":id": id, ":deleted_at": deleted_at},
        )?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<TaskRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| TaskRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<TaskRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE deleted_at IS NULL ORDER BY created_at ASC, id ASC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map([], |row| TaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Tasks the auto-scheduler may place, oldest first.
    pub fn list_schedulable(conn: &Connection) -> AppResult<Vec<SchedulableTaskRow>> {
        let statuses = SCHEDULABLE_STATUSES
            .iter()
            .map(|status| format!("'{status}'"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            r#"
            SELECT
                t.id,
                t.title,
                t.priority,
                t.due_at,
                t.is_hard_deadline,
                t.estimated_minutes,
                t.min_chunk_minutes,
                t.schedule_id,
                g.target_date AS goal_target_date,
                COALESCE((
                    SELECT SUM({BLOCK_MINUTES_SQL})
                    FROM time_blocks b
                    WHERE b.task_id = t.id AND b.is_auto_scheduled = 0
                ), 0) AS scheduled_minutes
            FROM tasks t
            LEFT JOIN goals g ON g.id = t.goal_id
            WHERE t.auto_schedule = 1
              AND t.deleted_at IS NULL
              AND t.estimated_minutes > 0
              AND t.status IN ({statuses})
            ORDER BY t.created_at ASC, t.id ASC
            "#
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| SchedulableTaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
