use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::auto_schedule::TaskToSchedule;
use crate::models::task::TaskPriority;

const HARD_DEADLINE_BONUS: f64 = 1000.0;
const DUE_DATE_MAX_BONUS: f64 = 50.0;
const DUE_DATE_DECAY_PER_DAY: f64 = 5.0;
const GOAL_MAX_BONUS: f64 = 30.0;
const GOAL_DECAY_PER_DAY: f64 = 3.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn priority_weight(priority: TaskPriority) -> f64 {
    match priority {
        TaskPriority::Urgent => 0.0,
        TaskPriority::High => 100.0,
        TaskPriority::Medium => 200.0,
        TaskPriority::Low => 300.0,
        TaskPriority::Backlog => 400.0,
    }
}

fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (deadline - now).num_seconds() as f64;
    (seconds / SECONDS_PER_DAY).max(0.0)
}

fn proximity_bonus(deadline: DateTime<Utc>, now: DateTime<Utc>, max: f64, decay: f64) -> f64 {
    (max - days_until(deadline, now) * decay).max(0.0)
}

/// Composite score for ordering; lower is scheduled sooner.
pub fn priority_score(task: &TaskToSchedule, now: DateTime<Utc>) -> f64 {
    let mut score = priority_weight(task.priority);

    if let Some(due_at) = task.due_at {
        score -= proximity_bonus(due_at, now, DUE_DATE_MAX_BONUS, DUE_DATE_DECAY_PER_DAY);
    }
    if task.is_hard_deadline {
        score -= HARD_DEADLINE_BONUS;
    }
    if let Some(goal_deadline) = task.goal_deadline {
        score -= proximity_bonus(goal_deadline, now, GOAL_MAX_BONUS, GOAL_DECAY_PER_DAY);
    }

    score
}

/// Drops tasks with nothing left to place and orders the rest by score.
///
/// The sort is stable: equal scores keep the order the tasks arrived in.
pub fn prioritize(tasks: Vec<TaskToSchedule>, now: DateTime<Utc>) -> Vec<TaskToSchedule> {
    let mut scored = tasks
        .into_iter()
        .filter(|task| task.remaining_minutes() > 0)
        .map(|task| (priority_score(&task, now), task))
        .collect::<Vec<_>>();

    scored.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    debug!(target: "app::scheduler", queued = scored.len(), "tasks prioritized");

    scored.into_iter().map(|(_, task)| task).collect()
}
