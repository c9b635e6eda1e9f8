use tracing::info;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::fixture::{ImportFixture, ImportSummary};
use crate::services::calendar_service::CalendarService;
use crate::services::goal_service::GoalService;
use crate::services::schedule_service::ScheduleService;
use crate::services::task_service::TaskService;
use crate::services::time_block_service::TimeBlockService;

pub struct ImportService {
    db: DbPool,
}

impl ImportService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn import_json(&self, raw: &str) -> AppResult<ImportSummary> {
        let fixture: ImportFixture = serde_json::from_str(raw)?;
        self.import(fixture)
    }

    /// All or nothing: the first invalid entry rolls back every section.
    pub fn import(&self, fixture: ImportFixture) -> AppResult<ImportSummary> {
        let summary = self.db.with_immediate_transaction(|tx| {
            let mut summary = ImportSummary::default();

            for goal in fixture.goals {
                GoalService::create_goal_in(tx, goal)?;
                summary.goals += 1;
            }
            for schedule in fixture.schedules {
                ScheduleService::create_schedule_in(tx, schedule)?;
                summary.schedules += 1;
            }
            for task in fixture.tasks {
                TaskService::create_task_in(tx, task)?;
                summary.tasks += 1;
            }
            for event in fixture.events {
                CalendarService::add_event_in(tx, event)?;
                summary.events += 1;
            }
            for block in fixture.blocks {
                TimeBlockService::create_manual_block_in(tx, block)?;
                summary.blocks += 1;
            }
            Ok(summary)
        })?;

        info!(
            target: "app::tasks",
            goals = summary.goals,
            schedules = summary.schedules,
            tasks = summary.tasks,
            events = summary.events,
            blocks = summary.blocks,
            "fixture imported"
        );
        Ok(summary)
    }
}
