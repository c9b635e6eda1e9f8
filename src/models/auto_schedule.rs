use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::task::TaskPriority;

/// A task as the auto-scheduler sees it: only the fields that drive ordering
/// and placement.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskToSchedule {
    pub id: String,
    pub title: String,
    pub priority: TaskPriority,
    pub estimated_minutes: i64,
    pub due_at: Option<DateTime<Utc>>,
    pub is_hard_deadline: bool,
    pub min_chunk_minutes: Option<i64>,
    pub schedule_id: Option<String>,
    /// Minutes already covered by manually placed blocks.
    pub scheduled_minutes: i64,
    pub goal_deadline: Option<DateTime<Utc>>,
}

impl TaskToSchedule {
    pub fn new(id: impl Into<String>, title: impl Into<String>, estimated_minutes: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            priority: TaskPriority::Medium,
            estimated_minutes,
            due_at: None,
            is_hard_deadline: false,
            min_chunk_minutes: None,
            schedule_id: None,
            scheduled_minutes: 0,
            goal_deadline: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_hard_deadline(mut self) -> Self {
        self.is_hard_deadline = true;
        self
    }

    pub fn with_min_chunk(mut self, minutes: i64) -> Self {
        self.min_chunk_minutes = Some(minutes);
        self
    }

    pub fn with_schedule(mut self, schedule_id: impl Into<String>) -> Self {
        self.schedule_id = Some(schedule_id.into());
        self
    }

    pub fn with_scheduled_minutes(mut self, minutes: i64) -> Self {
        self.scheduled_minutes = minutes;
        self
    }

    pub fn with_goal_deadline(mut self, goal_deadline: DateTime<Utc>) -> Self {
        self.goal_deadline = Some(goal_deadline);
        self
    }

    pub fn remaining_minutes(&self) -> i64 {
        self.estimated_minutes - self.scheduled_minutes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub task_id: String,
    pub date: NaiveDate,
    /// "HH:MM"
    pub start_time: String,
    /// "HH:MM"
    pub end_time: String,
    #[serde(default)]
    pub chunk_index: Option<u32>,
    #[serde(default)]
    pub chunk_total: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnplaceableTask {
    pub id: String,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateScheduleInput {
    /// Local date, "YYYY-MM-DD". Clamped to today.
    pub start_date: String,
    /// Local date, "YYYY-MM-DD", exclusive.
    pub end_date: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    pub placed: Vec<Placement>,
    pub unplaceable: Vec<UnplaceableTask>,
    pub dry_run: bool,
}
