//! Invariant checks over a spread of generated planning scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use autoplan_lib::db::DbPool;
use autoplan_lib::models::auto_schedule::{GenerateScheduleInput, Placement, ScheduleOutcome};
use autoplan_lib::models::calendar::{BusyStatus, CalendarEventInput};
use autoplan_lib::models::schedule::{ScheduleCreateInput, ScheduleWindowRecord};
use autoplan_lib::models::task::TaskCreateInput;
use autoplan_lib::models::time_block::ManualBlockInput;
use autoplan_lib::services::auto_schedule_service::AutoScheduleService;
use autoplan_lib::services::calendar_service::CalendarService;
use autoplan_lib::services::schedule_service::ScheduleService;
use autoplan_lib::services::schedule_utils::{format_hhmm, parse_hhmm};
use autoplan_lib::services::settings_service::{SettingsService, SettingsUpdateInput};
use autoplan_lib::services::task_service::TaskService;
use autoplan_lib::services::time_block_service::TimeBlockService;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use tempfile::{tempdir, TempDir};

const WINDOW_START: &str = "2026-10-19";
const WINDOW_END: &str = "2026-10-29";
const ZONES: [&str; 3] = ["UTC", "Europe/Berlin", "America/New_York"];
const PRIORITIES: [&str; 5] = ["urgent", "high", "medium", "low", "backlog"];

struct TaskPlan {
    id: String,
    estimate: i64,
    due_at: Option<DateTime<Utc>>,
    hard: bool,
    pinned: bool,
}

struct Scenario {
    _dir: TempDir,
    scheduler: AutoScheduleService,
    blocks: TimeBlockService,
    tz: Tz,
    bounds: (i64, i64),
    now: DateTime<Utc>,
    tasks: Vec<TaskPlan>,
    busy: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    /// date, start, end, linked task
    manual: Vec<(NaiveDate, i64, i64, Option<String>)>,
    /// day of week, start, end
    windows: Vec<(u32, i64, i64)>,
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()
}

fn build(seed: u64) -> Scenario {
    let mut rng = Mcg128Xsl64::seed_from_u64(seed);
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("props.sqlite")).expect("db pool");
    let settings = Arc::new(SettingsService::new(pool.clone()));
    let tasks = TaskService::new(pool.clone());
    let schedules = ScheduleService::new(pool.clone());
    let calendar = CalendarService::new(pool.clone());
    let blocks = TimeBlockService::new(pool.clone());

    let zone = *ZONES.choose(&mut rng).expect("zones");
    let bounds: (i64, i64) = (
        360 + 60 * rng.gen_range(0..3),
        1080 + 120 * rng.gen_range(0..3),
    );
    settings
        .update(SettingsUpdateInput {
            workday_start_minute: Some(bounds.0 as i16),
            workday_end_minute: Some(bounds.1 as i16),
            timezone: Some(zone.to_string()),
        })
        .expect("settings");
    let tz: Tz = zone.parse().expect("zone");

    let mut windows = Vec::new();
    for dow in 1..=5_u32 {
        let start = 480 + 5 * rng.gen_range(0..60);
        let end = start + 45 + 5 * rng.gen_range(0..40);
        windows.push((dow, start, end));
    }
    schedules
        .create_schedule(ScheduleCreateInput {
            id: Some("focus".into()),
            name: "Focus".into(),
            windows: windows
                .iter()
                .map(|&(dow, start, end)| ScheduleWindowRecord {
                    day_of_week: dow as u8,
                    start_time: format_hhmm(start),
                    end_time: format_hhmm(end),
                })
                .collect(),
        })
        .expect("schedule");

    let now = base()
        + Duration::days(2)
        + Duration::minutes(rng.gen_range(0..24 * 60))
        + Duration::seconds(rng.gen_range(0..60));

    let mut plans = Vec::new();
    for index in 0..10 {
        let id = format!("task-{index}");
        let estimate = 10 + 5 * rng.gen_range(0..60);
        let min_chunk = match rng.gen_range(0..4) {
            0 => Some(20),
            1 => Some(30 + 15 * rng.gen_range(0..3)),
            _ => None,
        };
        let due_at = rng
            .gen_bool(1.0 / 3.0)
            .then(|| now + Duration::hours(rng.gen_range(0..24 * 8)));
        let hard = due_at.is_some() && rng.gen_bool(1.0 / 3.0);
        let pinned = rng.gen_bool(1.0 / 4.0);
        tasks
            .create_task(TaskCreateInput {
                id: Some(id.clone()),
                title: format!("Task {index}"),
                priority: Some((*PRIORITIES.choose(&mut rng).expect("priorities")).into()),
                due_at: due_at.map(|due| due.to_rfc3339()),
                estimated_minutes: Some(estimate),
                auto_schedule: Some(true),
                is_hard_deadline: Some(hard),
                min_chunk_minutes: min_chunk,
                schedule_id: pinned.then(|| "focus".to_string()),
                ..Default::default()
            })
            .expect("task");
        plans.push(TaskPlan {
            id,
            estimate,
            due_at,
            hard,
            pinned,
        });
    }

    let mut busy = Vec::new();
    for index in 0..8 {
        let start = base() + Duration::minutes(rng.gen_range(0..10 * 24 * 60));
        let end = start + Duration::minutes(20 + rng.gen_range(0..280));
        let status = match rng.gen_range(0..4) {
            0 => BusyStatus::Tentative,
            1 => BusyStatus::Free,
            _ => BusyStatus::Busy,
        };
        calendar
            .add_event(CalendarEventInput {
                id: Some(format!("event-{index}")),
                title: format!("Event {index}"),
                start_at: start.to_rfc3339(),
                end_at: end.to_rfc3339(),
                busy_status: Some(status),
            })
            .expect("event");
        if status == BusyStatus::Busy {
            busy.push((start, end));
        }
    }

    let mut manual = Vec::new();
    for _ in 0..4 {
        let date = base().date_naive() + Duration::days(rng.gen_range(0..10));
        let start = 360 + rng.gen_range(0..12 * 60);
        let end = start + 10 + rng.gen_range(0..120);
        let task_id = rng
            .gen_bool(0.5)
            .then(|| format!("task-{}", rng.gen_range(0..plans.len())));
        blocks
            .create_manual_block(ManualBlockInput {
                task_id: task_id.clone(),
                date: date.format("%Y-%m-%d").to_string(),
                start_time: format_hhmm(start),
                end_time: format_hhmm(end),
            })
            .expect("manual block");
        manual.push((date, start, end, task_id));
    }

    Scenario {
        scheduler: AutoScheduleService::new(pool, settings),
        blocks,
        tz,
        bounds,
        now,
        tasks: plans,
        busy,
        manual,
        windows,
        _dir: dir,
    }
}

impl Scenario {
    fn run(&self, dry_run: bool) -> ScheduleOutcome {
        self.scheduler
            .generate_schedule_at(
                GenerateScheduleInput {
                    start_date: WINDOW_START.into(),
                    end_date: WINDOW_END.into(),
                    dry_run,
                },
                self.now,
            )
            .expect("generate")
    }

    fn remaining(&self, task: &TaskPlan) -> i64 {
        let manual = self
            .manual
            .iter()
            .filter(|(_, _, _, linked)| linked.as_deref() == Some(task.id.as_str()))
            .map(|(_, start, end, _)| end - start)
            .sum::<i64>();
        task.estimate - manual
    }
}

fn span(placement: &Placement) -> (i64, i64) {
    (
        parse_hhmm(&placement.start_time).expect("start"),
        parse_hhmm(&placement.end_time).expect("end"),
    )
}

fn local_span(date: NaiveDate, start: i64, end: i64) -> (NaiveDateTime, NaiveDateTime) {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap();
    (midnight + Duration::minutes(start), midnight + Duration::minutes(end))
}

fn snap_up(minutes: i64) -> i64 {
    (minutes + 14) / 15 * 15
}

fn check_invariants(seed: u64, scenario: &Scenario, outcome: &ScheduleOutcome) {
    let now_local = scenario.now.with_timezone(&scenario.tz).naive_local();
    let today = now_local.date();
    let now_seconds = now_local.num_seconds_from_midnight() as i64;
    let window_end = NaiveDate::parse_from_str(WINDOW_END, "%Y-%m-%d").unwrap();

    for placement in &outcome.placed {
        let (start, end) = span(placement);
        let label = format!("seed {seed}: {placement:?}");

        assert!(start < end, "{label} is empty");
        assert_eq!(start % 15, 0, "{label} start off grid");
        assert_eq!(end % 15, 0, "{label} end off grid");
        assert!(start >= scenario.bounds.0 && end <= scenario.bounds.1, "{label} outside workday");
        assert!(placement.date >= today && placement.date < window_end, "{label} outside window");
        if placement.date == today {
            assert!(start * 60 >= now_seconds, "{label} starts in the past");
        }

        let (from, to) = local_span(placement.date, start, end);
        for (busy_start, busy_end) in &scenario.busy {
            let busy_from = busy_start.with_timezone(&scenario.tz).naive_local();
            let busy_to = busy_end.with_timezone(&scenario.tz).naive_local();
            assert!(
                !(from < busy_to && busy_from < to),
                "{label} overlaps busy event {busy_start}..{busy_end}"
            );
        }
        for (date, manual_start, manual_end, _) in &scenario.manual {
            if *date == placement.date {
                assert!(
                    !(start < *manual_end && *manual_start < end),
                    "{label} overlaps manual block {manual_start}..{manual_end}"
                );
            }
        }
    }

    let mut by_day: HashMap<NaiveDate, Vec<(i64, i64)>> = HashMap::new();
    for placement in &outcome.placed {
        by_day.entry(placement.date).or_default().push(span(placement));
    }
    for (day, mut spans) in by_day {
        spans.sort();
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "seed {seed}: overlapping placements on {day}");
        }
    }

    for task in &scenario.tasks {
        let placements = outcome
            .placed
            .iter()
            .filter(|p| p.task_id == task.id)
            .collect::<Vec<_>>();
        let placed_minutes = placements
            .iter()
            .map(|p| {
                let (start, end) = span(p);
                end - start
            })
            .sum::<i64>();
        let remaining = scenario.remaining(task);
        let unplaceable = outcome.unplaceable.iter().any(|u| u.id == task.id);

        if remaining <= 0 {
            assert!(placements.is_empty() && !unplaceable, "seed {seed}: {} already covered", task.id);
            continue;
        }
        assert!(placed_minutes <= snap_up(remaining), "seed {seed}: {} over-placed", task.id);
        if !unplaceable {
            assert_eq!(placed_minutes, snap_up(remaining), "seed {seed}: {} under-placed", task.id);
        }

        if let (Some(due), false) = (task.due_at, task.hard) {
            let due_local = due.with_timezone(&scenario.tz).naive_local();
            for placement in &placements {
                let day_start = placement.date.and_hms_opt(0, 0, 0).unwrap();
                assert!(day_start <= due_local, "seed {seed}: {} placed after soft due", task.id);
            }
        }

        if task.pinned {
            for placement in &placements {
                let (start, end) = span(placement);
                let dow = placement.date.weekday().num_days_from_sunday();
                assert!(
                    scenario
                        .windows
                        .iter()
                        .any(|&(d, w_start, w_end)| d == dow && w_start <= start && end <= w_end),
                    "seed {seed}: {} escaped its schedule",
                    task.id
                );
            }
        }
    }
}

#[test]
fn placements_respect_invariants_across_scenarios() {
    for seed in 1..=16 {
        let scenario = build(seed);
        let outcome = scenario.run(true);
        check_invariants(seed, &scenario, &outcome);
    }
}

#[test]
fn committed_runs_are_stable_and_match_storage() {
    for seed in [3, 7, 11] {
        let scenario = build(seed);
        let first = scenario.run(false);
        let second = scenario.run(false);
        assert_eq!(first.placed, second.placed, "seed {seed}");
        check_invariants(seed, &scenario, &second);

        let start = NaiveDate::parse_from_str(WINDOW_START, "%Y-%m-%d").unwrap();
        let end = NaiveDate::parse_from_str(WINDOW_END, "%Y-%m-%d").unwrap();
        let mut stored = scenario
            .blocks
            .list_blocks_in_range(start, end)
            .expect("blocks")
            .into_iter()
            .filter(|block| block.is_auto_scheduled)
            .map(|block| (block.date, block.start_time, block.task_id))
            .collect::<Vec<_>>();
        stored.sort();
        let mut expected = second
            .placed
            .iter()
            .map(|p| {
                (
                    p.date.format("%Y-%m-%d").to_string(),
                    p.start_time.clone(),
                    Some(p.task_id.clone()),
                )
            })
            .collect::<Vec<_>>();
        expected.sort();
        assert_eq!(stored, expected, "seed {seed}");
    }
}
