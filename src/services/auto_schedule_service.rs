//! Runs one auto-scheduling pass: gather inputs, build availability, order
//! the tasks, place them, then either return the preview or replace the
//! stored auto-placed blocks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::repositories::calendar_event_repository::CalendarEventRepository;
use crate::db::repositories::schedule_repository::ScheduleRepository;
use crate::db::repositories::task_repository::TaskRepository;
use crate::db::repositories::time_block_repository::{TimeBlockRepository, TimeBlockRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::auto_schedule::{GenerateScheduleInput, Placement, ScheduleOutcome};
use crate::models::calendar::BusyStatus;
use crate::models::time_block::CREATED_BY_AGENT;
use crate::services::availability::{
    build_free_time, AvailabilityInput, BlockedRange, BusyEvent, WeeklyWindow, WorkdayBounds,
};
use crate::services::placement_engine::{place_tasks, PlacementResult};
use crate::services::schedule_utils::{
    self, day_start, days_between, format_date, local_date_of, parse_date, parse_hhmm,
};
use crate::services::settings_service::SettingsService;
use crate::services::task_prioritizer::prioritize;

type WindowKey = (NaiveDate, NaiveDate);

pub struct AutoScheduleService {
    db: DbPool,
    settings: Arc<SettingsService>,
    in_flight: Mutex<HashSet<WindowKey>>,
}

/// Marks a planning window busy until dropped.
struct InFlightGuard<'a> {
    registry: &'a Mutex<HashSet<WindowKey>>,
    key: WindowKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.remove(&self.key);
        }
    }
}

struct PlanningWindow {
    tz: Tz,
    bounds: WorkdayBounds,
    now: DateTime<Utc>,
    today: NaiveDate,
    start: NaiveDate,
    end: NaiveDate,
}

impl AutoScheduleService {
    pub fn new(db: DbPool, settings: Arc<SettingsService>) -> Self {
        Self {
            db,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn generate_schedule(&self, input: GenerateScheduleInput) -> AppResult<ScheduleOutcome> {
        self.generate_schedule_at(input, Utc::now())
    }

    /// Same as [`generate_schedule`](Self::generate_schedule) with an explicit
    /// clock.
    pub fn generate_schedule_at(
        &self,
        input: GenerateScheduleInput,
        now: DateTime<Utc>,
    ) -> AppResult<ScheduleOutcome> {
        let requested_start = parse_date(&input.start_date)?;
        let end = parse_date(&input.end_date)?;
        if end <= requested_start {
            return Err(AppError::validation(format!(
                "end date {} must be after start date {}",
                input.end_date, input.start_date
            )));
        }

        let tz = self.settings.timezone()?;
        let bounds = self.settings.workday_bounds()?;
        let today = local_date_of(now, &tz);
        let window = PlanningWindow {
            tz,
            bounds,
            now,
            today,
            start: requested_start.max(today),
            end,
        };

        info!(
            target: "app::scheduler",
            start = %window.start,
            end = %window.end,
            dry_run = input.dry_run,
            "auto-schedule run started"
        );

        let outcome = if input.dry_run {
            let result = self.db.with_connection(|conn| compute(conn, &window))?;
            ScheduleOutcome {
                placed: result.placed,
                unplaceable: result.unplaceable,
                dry_run: true,
            }
        } else {
            let _guard = self.acquire(window.start, window.end)?;
            let result = self.db.with_immediate_transaction(|tx| {
                let result = compute(tx, &window)?;
                commit(tx, &window, &result.placed)?;
                Ok(result)
            })?;
            ScheduleOutcome {
                placed: result.placed,
                unplaceable: result.unplaceable,
                dry_run: false,
            }
        };

        info!(
            target: "app::scheduler",
            placed = outcome.placed.len(),
            unplaceable = outcome.unplaceable.len(),
            dry_run = outcome.dry_run,
            "auto-schedule run finished"
        );

        Ok(outcome)
    }

    fn acquire(&self, start: NaiveDate, end: NaiveDate) -> AppResult<InFlightGuard<'_>> {
        let key = (start, end);
        let mut registry = self
            .in_flight
            .lock()
            .map_err(|_| AppError::other("auto-schedule registry lock poisoned"))?;
        if !registry.insert(key) {
            return Err(AppError::conflict(format!(
                "an auto-schedule run for {start}..{end} is already in progress"
            )));
        }
        Ok(InFlightGuard {
            registry: &self.in_flight,
            key,
        })
    }
}

fn compute(conn: &Connection, window: &PlanningWindow) -> AppResult<PlacementResult> {
    let days = days_between(window.start, window.end);
    let start_key = format_date(window.start);
    let end_key = format_date(window.end);

    // One spare day each side covers any UTC offset; day matching happens later.
    let event_from = schedule_utils::format_datetime(
        (day_start(window.start) - Duration::days(1)).and_utc(),
    );
    let event_to =
        schedule_utils::format_datetime((day_start(window.end) + Duration::days(1)).and_utc());

    let events = CalendarEventRepository::list_busy_overlapping(conn, &event_from, &event_to)?
        .into_iter()
        .map(|row| {
            let record = row.into_record()?;
            Ok(BusyEvent {
                start_at: schedule_utils::parse_datetime(&record.start_at)?,
                end_at: schedule_utils::parse_datetime(&record.end_at)?,
                status: record.busy_status,
                id: record.id,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let manual_blocks = TimeBlockRepository::list_manual_in_range(conn, &start_key, &end_key)?
        .into_iter()
        .map(|row| {
            Ok(BlockedRange {
                date: parse_date(&row.date)?,
                start: parse_hhmm(&row.start_time)?,
                end: parse_hhmm(&row.end_time)?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let weekly_windows = ScheduleRepository::list_windows(conn)?
        .into_iter()
        .map(|row| {
            Ok(WeeklyWindow {
                start: parse_hhmm(&row.start_time)?,
                end: parse_hhmm(&row.end_time)?,
                schedule_id: row.schedule_id,
                day_of_week: row.day_of_week,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let tasks = TaskRepository::list_schedulable(conn)?
        .into_iter()
        .map(|row| row.into_task())
        .collect::<AppResult<Vec<_>>>()?;

    debug!(
        target: "app::scheduler",
        days = days.len(),
        events = events.iter().filter(|e| e.status == BusyStatus::Busy).count(),
        manual_blocks = manual_blocks.len(),
        schedule_windows = weekly_windows.len(),
        tasks = tasks.len(),
        "inputs gathered"
    );

    let mut pool = build_free_time(AvailabilityInput {
        days: &days,
        events: &events,
        manual_blocks: &manual_blocks,
        weekly_windows: &weekly_windows,
        bounds: window.bounds,
        tz: window.tz,
        now: window.now,
    });

    let queue = prioritize(tasks, window.now);
    Ok(place_tasks(&queue, &mut pool, &window.tz))
}

/// Replaces stored auto blocks with `placed`: everything in the window and
/// anything dated before today goes, the new placements come in.
fn commit(conn: &Connection, window: &PlanningWindow, placed: &[Placement]) -> AppResult<()> {
    let stale = TimeBlockRepository::list_stale_auto_ids(
        conn,
        &format_date(window.start),
        &format_date(window.end),
        &format_date(window.today),
    )?;
    let deleted = TimeBlockRepository::delete_by_ids(conn, &stale)?;

    let created_at = window.now.to_rfc3339();
    let rows = placed
        .iter()
        .map(|placement| TimeBlockRow {
            id: Uuid::new_v4().to_string(),
            task_id: Some(placement.task_id.clone()),
            date: format_date(placement.date),
            start_time: placement.start_time.clone(),
            end_time: placement.end_time.clone(),
            is_auto_scheduled: true,
            chunk_index: placement.chunk_index,
            chunk_total: placement.chunk_total,
            created_by: CREATED_BY_AGENT.to_string(),
            created_at: created_at.clone(),
        })
        .collect::<Vec<_>>();
    TimeBlockRepository::insert_many(conn, &rows)?;

    info!(
        target: "app::scheduler",
        deleted,
        inserted = rows.len(),
        "auto blocks replaced"
    );
    Ok(())
}
