//! Greedy allocator: walks the prioritized queue and carves placements out of
//! the shared free-time pool. No backtracking; a consumed slot is never
//! revisited by a later task.

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::models::auto_schedule::{Placement, TaskToSchedule, UnplaceableTask};
use crate::services::availability::FreeTimePool;
use crate::services::schedule_utils::{
    day_start, format_hhmm, local_datetime_of, snap_up, Interval, SNAP_MINUTES,
};

pub const NO_CONTIGUOUS_SLOT: &str = "No contiguous slot large enough";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementResult {
    pub placed: Vec<Placement>,
    pub unplaceable: Vec<UnplaceableTask>,
}

/// Places every task in queue order, consuming the pool as it goes.
pub fn place_tasks(queue: &[TaskToSchedule], pool: &mut FreeTimePool, tz: &Tz) -> PlacementResult {
    let mut result = PlacementResult::default();

    for task in queue {
        let remaining = task.remaining_minutes();
        if remaining <= 0 {
            continue;
        }

        match task.min_chunk_minutes {
            Some(min_chunk) if min_chunk > 0 && remaining > min_chunk => {
                place_chunked(task, remaining, min_chunk, pool, tz, &mut result)
            }
            _ => place_whole(task, remaining, pool, tz, &mut result),
        }
    }

    info!(
        target: "app::scheduler",
        placed = result.placed.len(),
        unplaceable = result.unplaceable.len(),
        "placement finished"
    );

    result
}

fn place_chunked(
    task: &TaskToSchedule,
    remaining: i64,
    min_chunk: i64,
    pool: &mut FreeTimePool,
    tz: &Tz,
    result: &mut PlacementResult,
) {
    let chunk_size = snap_up(min_chunk.max(SNAP_MINUTES));
    let total = (remaining + chunk_size - 1) / chunk_size;
    let mut placed = 0_i64;

    let days = pool.days().to_vec();
    for day in days {
        if placed >= total {
            break;
        }
        if is_past_due(task, day, tz) {
            continue;
        }

        let this_chunk = if placed == total - 1 {
            snap_up(remaining - placed * chunk_size)
        } else {
            chunk_size
        };

        if let Some(slot) = find_and_consume_slot(pool, day, task.schedule_id.as_deref(), this_chunk) {
            result.placed.push(to_placement(
                task,
                day,
                slot,
                Some((placed as u32, total as u32)),
            ));
            placed += 1;
        }
    }

    if placed < total {
        debug!(target: "app::scheduler", task_id = %task.id, placed, total, "chunked task partially placed");
        result.unplaceable.push(UnplaceableTask {
            id: task.id.clone(),
            title: task.title.clone(),
            reason: format!("Only placed {placed}/{total} chunks"),
        });
    }
}

fn place_whole(
    task: &TaskToSchedule,
    remaining: i64,
    pool: &mut FreeTimePool,
    tz: &Tz,
    result: &mut PlacementResult,
) {
    let needed = snap_up(remaining);

    let days = pool.days().to_vec();
    for day in days {
        if is_past_due(task, day, tz) {
            continue;
        }
        if let Some(slot) = find_and_consume_slot(pool, day, task.schedule_id.as_deref(), needed) {
            result.placed.push(to_placement(task, day, slot, None));
            return;
        }
    }

    debug!(target: "app::scheduler", task_id = %task.id, needed, "no slot found");
    result.unplaceable.push(UnplaceableTask {
        id: task.id.clone(),
        title: task.title.clone(),
        reason: NO_CONTIGUOUS_SLOT.to_string(),
    });
}

/// Soft deadlines never place work on a day that begins after the due instant.
fn is_past_due(task: &TaskToSchedule, day: NaiveDate, tz: &Tz) -> bool {
    if task.is_hard_deadline {
        return false;
    }
    match task.due_at {
        Some(due_at) => day_start(day) > local_datetime_of(due_at, tz),
        None => false,
    }
}

/// Finds the earliest slot of `needed` minutes on `day` and removes it from
/// the pool. With a schedule id the slot must also sit inside one of that
/// schedule's windows for the day.
pub fn find_and_consume_slot(
    pool: &mut FreeTimePool,
    day: NaiveDate,
    schedule_id: Option<&str>,
    needed: i64,
) -> Option<Interval> {
    if needed <= 0 {
        return None;
    }

    let slot = match schedule_id {
        Some(schedule_id) => pool
            .schedule_windows(day)
            .iter()
            .filter(|window| window.schedule_id == schedule_id)
            .find_map(|window| {
                pool.free_intervals(day).iter().find_map(|free| {
                    let start = free.start.max(window.start);
                    let end = free.end.min(window.end);
                    (end - start >= needed).then(|| Interval::new(start, start + needed))
                })
            }),
        None => pool
            .free_intervals(day)
            .iter()
            .find(|free| free.len() >= needed)
            .map(|free| Interval::new(free.start, free.start + needed)),
    }?;

    pool.consume(day, slot.start, slot.end);
    Some(slot)
}

fn to_placement(
    task: &TaskToSchedule,
    day: NaiveDate,
    slot: Interval,
    chunk: Option<(u32, u32)>,
) -> Placement {
    Placement {
        task_id: task.id.clone(),
        date: day,
        start_time: format_hhmm(slot.start),
        end_time: format_hhmm(slot.end),
        chunk_index: chunk.map(|(index, _)| index),
        chunk_total: chunk.map(|(_, total)| total),
    }
}
