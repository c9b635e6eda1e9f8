use std::sync::Arc;

use autoplan_lib::commands::{self, settings::SettingsUpdatePayload, AppState};
use autoplan_lib::db::repositories::time_block_repository::{TimeBlockRepository, TimeBlockRow};
use autoplan_lib::db::DbPool;
use autoplan_lib::models::auto_schedule::{GenerateScheduleInput, ScheduleOutcome};
use autoplan_lib::models::calendar::{BusyStatus, CalendarEventInput};
use autoplan_lib::models::task::TaskCreateInput;
use autoplan_lib::models::time_block::{ManualBlockInput, TimeBlockRecord};
use autoplan_lib::services::auto_schedule_service::AutoScheduleService;
use autoplan_lib::services::calendar_service::CalendarService;
use autoplan_lib::services::settings_service::{SettingsService, SettingsUpdateInput};
use autoplan_lib::services::task_service::TaskService;
use autoplan_lib::services::time_block_service::TimeBlockService;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tempfile::{tempdir, TempDir};

struct Harness {
    _dir: TempDir,
    pool: DbPool,
    settings: Arc<SettingsService>,
    scheduler: AutoScheduleService,
    tasks: TaskService,
    calendar: CalendarService,
    blocks: TimeBlockService,
}

fn harness() -> Harness {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("autoplan.sqlite")).expect("db pool");
    let settings = Arc::new(SettingsService::with_default_timezone(pool.clone(), "UTC"));
    Harness {
        scheduler: AutoScheduleService::new(pool.clone(), Arc::clone(&settings)),
        tasks: TaskService::new(pool.clone()),
        calendar: CalendarService::new(pool.clone()),
        blocks: TimeBlockService::new(pool.clone()),
        settings,
        pool,
        _dir: dir,
    }
}

impl Harness {
    fn workday(&self, start: i16, end: i16) {
        self.settings
            .update(SettingsUpdateInput {
                workday_start_minute: Some(start),
                workday_end_minute: Some(end),
                timezone: None,
            })
            .expect("workday settings");
    }

    fn add_task(&self, input: TaskCreateInput) {
        self.tasks.create_task(input).expect("create task");
    }

    fn block_whole_day(&self, date: &str) {
        self.blocks
            .create_manual_block(ManualBlockInput {
                task_id: None,
                date: date.into(),
                start_time: "00:00".into(),
                end_time: "24:00".into(),
            })
            .expect("manual block");
    }

    fn run(&self, start: &str, end: &str, dry_run: bool, now: DateTime<Utc>) -> ScheduleOutcome {
        self.scheduler
            .generate_schedule_at(
                GenerateScheduleInput {
                    start_date: start.into(),
                    end_date: end.into(),
                    dry_run,
                },
                now,
            )
            .expect("generate schedule")
    }

    fn auto_blocks(&self, start: &str, end: &str) -> Vec<TimeBlockRecord> {
        self.blocks
            .list_blocks_in_range(date(start), date(end))
            .expect("list blocks")
            .into_iter()
            .filter(|block| block.is_auto_scheduled)
            .collect()
    }
}

fn auto_task(id: &str, minutes: i64) -> TaskCreateInput {
    TaskCreateInput {
        id: Some(id.into()),
        title: format!("Task {id}"),
        estimated_minutes: Some(minutes),
        auto_schedule: Some(true),
        ..Default::default()
    }
}

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("date")
}

/// Monday 2026-10-19, 07:00 UTC.
fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap()
}

#[test]
fn single_task_lands_at_start_of_open_day() {
    let h = harness();
    h.workday(9 * 60, 17 * 60);
    h.add_task(auto_task("t1", 60));

    let outcome = h.run("2026-10-20", "2026-10-21", false, monday_morning());

    assert!(outcome.unplaceable.is_empty());
    assert_eq!(outcome.placed.len(), 1);
    let placed = &outcome.placed[0];
    assert_eq!(placed.date, date("2026-10-20"));
    assert_eq!((placed.start_time.as_str(), placed.end_time.as_str()), ("09:00", "10:00"));

    let stored = h.auto_blocks("2026-10-20", "2026-10-21");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].task_id.as_deref(), Some("t1"));
    assert_eq!(stored[0].created_by, "agent");
    assert_eq!(stored[0].chunk_index, None);
}

#[test]
fn chunked_task_spreads_across_days() {
    let h = harness();
    h.workday(9 * 60, 17 * 60);
    h.add_task(TaskCreateInput {
        min_chunk_minutes: Some(30),
        ..auto_task("study", 90)
    });

    let outcome = h.run("2026-10-20", "2026-10-23", false, monday_morning());

    assert!(outcome.unplaceable.is_empty());
    let dates = outcome.placed.iter().map(|p| p.date).collect::<Vec<_>>();
    assert_eq!(dates, vec![date("2026-10-20"), date("2026-10-21"), date("2026-10-22")]);
    for (index, placed) in outcome.placed.iter().enumerate() {
        assert_eq!(placed.start_time, "09:00");
        assert_eq!(placed.end_time, "09:30");
        assert_eq!(placed.chunk_index, Some(index as u32));
        assert_eq!(placed.chunk_total, Some(3));
    }

    let stored = h.auto_blocks("2026-10-20", "2026-10-23");
    assert!(stored.iter().all(|block| block.chunk_total == Some(3)));
}

#[test]
fn soft_deadline_is_not_placed_past_due_day() {
    let h = harness();
    for day in ["2026-10-20", "2026-10-21", "2026-10-22"] {
        h.block_whole_day(day);
    }
    h.add_task(TaskCreateInput {
        due_at: Some("2026-10-21T18:00:00Z".into()),
        ..auto_task("soft", 60)
    });

    let outcome = h.run("2026-10-20", "2026-10-25", false, monday_morning());

    assert!(outcome.placed.is_empty());
    assert_eq!(outcome.unplaceable.len(), 1);
    assert_eq!(outcome.unplaceable[0].id, "soft");
    assert_eq!(outcome.unplaceable[0].reason, "No contiguous slot large enough");
}

#[test]
fn hard_deadline_runs_past_due_day() {
    let h = harness();
    for day in ["2026-10-20", "2026-10-21", "2026-10-22"] {
        h.block_whole_day(day);
    }
    h.add_task(TaskCreateInput {
        due_at: Some("2026-10-21T18:00:00Z".into()),
        is_hard_deadline: Some(true),
        ..auto_task("hard", 60)
    });

    let outcome = h.run("2026-10-20", "2026-10-25", false, monday_morning());

    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].date, date("2026-10-23"));
}

#[test]
fn day_covered_by_multi_day_event_gets_nothing() {
    let h = harness();
    h.calendar
        .add_event(CalendarEventInput {
            id: Some("offsite".into()),
            title: "Offsite".into(),
            start_at: "2026-10-20T20:00:00Z".into(),
            end_at: "2026-10-22T08:00:00Z".into(),
            busy_status: Some(BusyStatus::Busy),
        })
        .expect("event");
    h.add_task(TaskCreateInput {
        min_chunk_minutes: Some(30),
        ..auto_task("long", 120)
    });

    let outcome = h.run("2026-10-20", "2026-10-24", false, monday_morning());

    assert!(outcome.placed.iter().all(|p| p.date != date("2026-10-21")));
    let starts = outcome
        .placed
        .iter()
        .map(|p| (p.date, p.start_time.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        starts,
        vec![
            (date("2026-10-20"), "06:00"),
            (date("2026-10-22"), "08:00"),
            (date("2026-10-23"), "06:00"),
        ]
    );
    assert_eq!(outcome.unplaceable[0].reason, "Only placed 3/4 chunks");
}

#[test]
fn tentative_and_free_events_do_not_block() {
    let h = harness();
    h.workday(9 * 60, 10 * 60);
    for (id, status) in [("maybe", BusyStatus::Tentative), ("open", BusyStatus::Free)] {
        h.calendar
            .add_event(CalendarEventInput {
                id: Some(id.into()),
                title: id.into(),
                start_at: "2026-10-20T09:00:00Z".into(),
                end_at: "2026-10-20T10:00:00Z".into(),
                busy_status: Some(status),
            })
            .expect("event");
    }
    h.add_task(auto_task("t1", 60));

    let outcome = h.run("2026-10-20", "2026-10-21", true, monday_morning());
    assert_eq!(outcome.placed.len(), 1);
}

#[test]
fn regeneration_is_idempotent() {
    let h = harness();
    h.add_task(TaskCreateInput {
        priority: Some("high".into()),
        ..auto_task("a", 90)
    });
    h.add_task(TaskCreateInput {
        min_chunk_minutes: Some(45),
        ..auto_task("b", 150)
    });
    h.block_whole_day("2026-10-21");

    let first = h.run("2026-10-19", "2026-10-24", false, monday_morning());
    let stored_first = h.auto_blocks("2026-10-19", "2026-10-24");
    let second = h.run("2026-10-19", "2026-10-24", false, monday_morning());
    let stored_second = h.auto_blocks("2026-10-19", "2026-10-24");

    assert_eq!(first.placed, second.placed);
    assert_eq!(first.unplaceable, second.unplaceable);
    assert_eq!(stored_first.len(), first.placed.len());
    assert_eq!(stored_second.len(), second.placed.len());
}

#[test]
fn dry_run_writes_nothing() {
    let h = harness();
    h.add_task(auto_task("t1", 60));

    let preview = h.run("2026-10-20", "2026-10-22", true, monday_morning());

    assert!(preview.dry_run);
    assert_eq!(preview.placed.len(), 1);
    assert!(h.auto_blocks("2026-10-20", "2026-10-22").is_empty());

    let committed = h.run("2026-10-20", "2026-10-22", false, monday_morning());
    assert_eq!(committed.placed, preview.placed);
}

#[test]
fn commit_purges_past_and_in_window_auto_blocks_only() {
    let h = harness();
    let stale = |id: &str, day: &str| TimeBlockRow {
        id: id.into(),
        task_id: None,
        date: day.into(),
        start_time: "10:00".into(),
        end_time: "11:00".into(),
        is_auto_scheduled: true,
        chunk_index: None,
        chunk_total: None,
        created_by: "agent".into(),
        created_at: "2026-10-01T00:00:00Z".into(),
    };
    h.pool
        .with_connection(|conn| {
            TimeBlockRepository::insert_many(
                conn,
                &[
                    stale("past", "2026-10-10"),
                    stale("inside", "2026-10-20"),
                    stale("later", "2026-11-05"),
                ],
            )
        })
        .expect("seed blocks");
    h.block_whole_day("2026-10-12");

    h.run("2026-10-19", "2026-10-22", false, monday_morning());

    let remaining = h
        .blocks
        .list_blocks_in_range(date("2026-10-01"), date("2026-12-01"))
        .expect("list");
    let ids = remaining
        .iter()
        .filter(|block| block.is_auto_scheduled)
        .map(|block| block.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["later"]);
    assert_eq!(remaining.iter().filter(|b| !b.is_auto_scheduled).count(), 1);
}

#[test]
fn manual_time_counts_against_estimate() {
    let h = harness();
    h.add_task(auto_task("t1", 120));
    h.blocks
        .create_manual_block(ManualBlockInput {
            task_id: Some("t1".into()),
            date: "2026-10-19".into(),
            start_time: "14:00".into(),
            end_time: "15:00".into(),
        })
        .expect("manual block");

    let outcome = h.run("2026-10-20", "2026-10-21", true, monday_morning());

    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].start_time, "06:00");
    assert_eq!(outcome.placed[0].end_time, "07:00");
}

#[test]
fn ineligible_tasks_are_ignored() {
    let h = harness();
    h.add_task(TaskCreateInput {
        status: Some("done".into()),
        ..auto_task("finished", 60)
    });
    h.add_task(TaskCreateInput {
        auto_schedule: Some(false),
        ..auto_task("manual", 60)
    });
    h.add_task(auto_task("deleted", 60));
    h.tasks.delete_task("deleted").expect("delete");
    h.add_task(TaskCreateInput {
        status: Some("blocked".into()),
        ..auto_task("blocked", 60)
    });

    let outcome = h.run("2026-10-20", "2026-10-21", true, monday_morning());

    let ids = outcome.placed.iter().map(|p| p.task_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["blocked"]);
}

#[test]
fn hard_deadline_wins_contested_slot() {
    let h = harness();
    h.workday(9 * 60, 10 * 60);
    h.add_task(auto_task("soft", 60));
    h.add_task(TaskCreateInput {
        is_hard_deadline: Some(true),
        due_at: Some("2026-12-01T00:00:00Z".into()),
        ..auto_task("hard", 60)
    });

    let outcome = h.run("2026-10-20", "2026-10-21", true, monday_morning());

    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].task_id, "hard");
    assert_eq!(outcome.unplaceable[0].id, "soft");
}

#[test]
fn local_day_follows_configured_timezone() {
    let h = harness();
    h.settings
        .update(SettingsUpdateInput {
            timezone: Some("America/New_York".into()),
            ..Default::default()
        })
        .expect("timezone");
    // 06:00-07:00 in New York.
    h.calendar
        .add_event(CalendarEventInput {
            id: None,
            title: "Early call".into(),
            start_at: "2026-10-19T10:00:00Z".into(),
            end_at: "2026-10-19T11:00:00Z".into(),
            busy_status: None,
        })
        .expect("event");
    h.add_task(auto_task("t1", 60));

    // 03:00 UTC is still Sunday evening in New York.
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap();
    let outcome = h.run("2026-10-18", "2026-10-20", true, now);

    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].date, date("2026-10-19"));
    assert_eq!(outcome.placed[0].start_time, "07:00");
}

#[test]
fn today_is_never_backfilled() {
    let h = harness();
    h.add_task(auto_task("t1", 30));

    let now = Utc.with_ymd_and_hms(2026, 10, 19, 13, 2, 0).unwrap();
    let outcome = h.run("2026-10-12", "2026-10-20", true, now);

    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].date, date("2026-10-19"));
    assert_eq!(outcome.placed[0].start_time, "13:15");
}

#[test]
fn concurrent_commits_leave_one_consistent_set() {
    let h = harness();
    for index in 0..6 {
        h.add_task(TaskCreateInput {
            min_chunk_minutes: Some(30),
            ..auto_task(&format!("t{index}"), 120)
        });
    }

    let other = AutoScheduleService::new(h.pool.clone(), Arc::clone(&h.settings));
    let input = || GenerateScheduleInput {
        start_date: "2026-10-20".into(),
        end_date: "2026-10-27".into(),
        dry_run: false,
    };

    let (first, second) = std::thread::scope(|scope| {
        let a = scope.spawn(|| h.scheduler.generate_schedule_at(input(), monday_morning()));
        let b = scope.spawn(|| other.generate_schedule_at(input(), monday_morning()));
        (a.join().expect("thread a"), b.join().expect("thread b"))
    });
    let first = first.expect("first run");
    let second = second.expect("second run");
    assert_eq!(first.placed, second.placed);

    let stored = h.auto_blocks("2026-10-20", "2026-10-27");
    assert_eq!(stored.len(), first.placed.len());
}

#[tokio::test]
async fn command_layer_runs_imported_fixture() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("cli.sqlite")).expect("db pool");
    let state = AppState::new(pool);
    commands::settings::settings_update(
        &state,
        SettingsUpdatePayload {
            timezone: Some("UTC".into()),
            ..Default::default()
        },
    )
    .await
    .expect("pin zone");

    // Far enough ahead that the real clock never clamps it.
    let fixture = r#"{
        "schedules": [{"id": "mornings", "name": "Mornings",
                       "windows": [{"dayOfWeek": 1, "startTime": "08:00", "endTime": "10:00"}]}],
        "tasks": [
            {"id": "pinned", "title": "Pinned", "estimatedMinutes": 60,
             "autoSchedule": true, "scheduleId": "mornings"},
            {"id": "loose", "title": "Loose", "estimatedMinutes": 30, "autoSchedule": true}
        ],
        "events": [{"title": "Breakfast", "startAt": "2040-01-02T08:00:00Z",
                    "endAt": "2040-01-02T08:30:00Z"}]
    }"#;
    let summary = commands::import::import_fixture(&state, fixture.to_string())
        .await
        .expect("import");
    assert_eq!(summary.tasks, 2);

    // 2040-01-02 is a Monday.
    let outcome = commands::auto_schedule::auto_schedule_generate(
        &state,
        GenerateScheduleInput {
            start_date: "2040-01-02".into(),
            end_date: "2040-01-03".into(),
            dry_run: false,
        },
    )
    .await
    .expect("generate");

    let pinned = outcome
        .placed
        .iter()
        .find(|p| p.task_id == "pinned")
        .expect("pinned placed");
    assert_eq!((pinned.start_time.as_str(), pinned.end_time.as_str()), ("08:30", "09:30"));
    let loose = outcome
        .placed
        .iter()
        .find(|p| p.task_id == "loose")
        .expect("loose placed");
    assert_eq!(loose.start_time, "06:00");

    let blocks = commands::time_blocks::time_blocks_list(
        &state,
        "2040-01-02".into(),
        "2040-01-03".into(),
    )
    .await
    .expect("blocks");
    assert_eq!(blocks.len(), 2);
}
