//! Builds the per-day pool of free time the placement engine draws from.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::models::calendar::BusyStatus;
use crate::services::schedule_utils::{
    self, day_start, local_datetime_of, minutes_of_day, minutes_of_day_ceil, snap_down, snap_up,
    subtract_interval, Interval,
};

/// Working-day span in minutes from midnight, e.g. 06:00–22:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkdayBounds {
    pub start: i64,
    pub end: i64,
}

impl Default for WorkdayBounds {
    fn default() -> Self {
        Self {
            start: 6 * 60,
            end: 22 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusyEvent {
    pub id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BusyStatus,
}

/// A manually placed block; always unavailable to the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedRange {
    pub date: NaiveDate,
    pub start: i64,
    pub end: i64,
}

/// One recurring window of a schedule definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyWindow {
    pub schedule_id: String,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    pub start: i64,
    pub end: i64,
}

/// A schedule window resolved onto a concrete day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub schedule_id: String,
    pub start: i64,
    pub end: i64,
}

pub struct AvailabilityInput<'a> {
    pub days: &'a [NaiveDate],
    pub events: &'a [BusyEvent],
    pub manual_blocks: &'a [BlockedRange],
    pub weekly_windows: &'a [WeeklyWindow],
    pub bounds: WorkdayBounds,
    pub tz: Tz,
    pub now: DateTime<Utc>,
}

/// Unconsumed free time per day plus the schedule windows active on each day.
///
/// Owned by a single scheduling run. Every placement shrinks it, which is what
/// keeps two placements from ever sharing a minute.
#[derive(Debug, Clone, Default)]
pub struct FreeTimePool {
    days: Vec<NaiveDate>,
    free: HashMap<NaiveDate, Vec<Interval>>,
    windows: HashMap<NaiveDate, Vec<ScheduleWindow>>,
}

impl FreeTimePool {
    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn free_intervals(&self, day: NaiveDate) -> &[Interval] {
        self.free.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn schedule_windows(&self, day: NaiveDate) -> &[ScheduleWindow] {
        self.windows.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn free_minutes(&self, day: NaiveDate) -> i64 {
        self.free_intervals(day).iter().map(Interval::len).sum()
    }

    /// Removes `[start, end)` from the day's free time.
    pub fn consume(&mut self, day: NaiveDate, start: i64, end: i64) {
        if let Some(intervals) = self.free.get_mut(&day) {
            *intervals = subtract_interval(intervals, start, end);
        }
    }
}

pub fn build_free_time(input: AvailabilityInput<'_>) -> FreeTimePool {
    let AvailabilityInput {
        days,
        events,
        manual_blocks,
        weekly_windows,
        bounds,
        tz,
        now,
    } = input;

    let now_local = local_datetime_of(now, &tz);
    let today = now_local.date();
    let earliest_today = snap_up(minutes_of_day_ceil(now_local));

    let mut pool = FreeTimePool {
        days: days.to_vec(),
        ..Default::default()
    };

    for &day in days {
        let mut free = vec![Interval::new(bounds.start, bounds.end)];
        subtract_busy_events(&mut free, day, events, bounds, &tz);

        for block in manual_blocks.iter().filter(|block| block.date == day) {
            free = subtract_interval(&free, snap_down(block.start), snap_up(block.end));
        }

        if day == today {
            free = free
                .into_iter()
                .filter(|interval| interval.end > earliest_today)
                .map(|interval| Interval::new(interval.start.max(earliest_today), interval.end))
                .collect();
        }

        free.retain(|interval| !interval.is_empty());

        let dow = schedule_utils::day_of_week(day);
        let mut day_windows = weekly_windows
            .iter()
            .filter(|window| window.day_of_week == dow)
            .filter_map(|window| {
                let start = snap_up(window.start);
                let end = snap_down(window.end);
                (start < end).then(|| ScheduleWindow {
                    schedule_id: window.schedule_id.clone(),
                    start,
                    end,
                })
            })
            .collect::<Vec<_>>();
        day_windows.sort_by_key(|window| window.start);

        debug!(
            target: "app::scheduler",
            day = %day,
            free_minutes = free.iter().map(Interval::len).sum::<i64>(),
            windows = day_windows.len(),
            "availability built"
        );

        pool.free.insert(day, free);
        pool.windows.insert(day, day_windows);
    }

    pool
}

fn subtract_busy_events(
    free: &mut Vec<Interval>,
    day: NaiveDate,
    events: &[BusyEvent],
    bounds: WorkdayBounds,
    tz: &Tz,
) {
    let this_midnight = day_start(day);
    let next_midnight = match day.succ_opt() {
        Some(next) => day_start(next),
        None => return,
    };

    for event in events.iter().filter(|event| event.status == BusyStatus::Busy) {
        if event.end_at <= event.start_at {
            warn!(target: "app::scheduler", event_id = %event.id, "ignoring calendar event with empty range");
            continue;
        }

        let start = local_datetime_of(event.start_at, tz);
        let end = local_datetime_of(event.end_at, tz);
        let starts_today = start.date() == day;
        let ends_today = end.date() == day;

        if !starts_today && !ends_today {
            if start <= this_midnight && end >= next_midnight {
                free.clear();
                return;
            }
            continue;
        }

        let busy_start = if starts_today {
            snap_down(minutes_of_day(start))
        } else {
            bounds.start
        };
        let busy_end = if ends_today {
            snap_up(minutes_of_day_ceil(end))
        } else {
            bounds.end
        };

        if busy_start < busy_end {
            *free = subtract_interval(free, busy_start, busy_end);
        }
    }
}
