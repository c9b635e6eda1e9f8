use serde::{Deserialize, Serialize};

use crate::models::calendar::CalendarEventInput;
use crate::models::goal::GoalCreateInput;
use crate::models::schedule::ScheduleCreateInput;
use crate::models::task::TaskCreateInput;
use crate::models::time_block::ManualBlockInput;

/// A batch of planning data loaded in one go. Sections are applied in field
/// order so later ones can reference ids declared earlier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImportFixture {
    #[serde(default)]
    pub goals: Vec<GoalCreateInput>,
    #[serde(default)]
    pub schedules: Vec<ScheduleCreateInput>,
    #[serde(default)]
    pub tasks: Vec<TaskCreateInput>,
    #[serde(default)]
    pub events: Vec<CalendarEventInput>,
    #[serde(default)]
    pub blocks: Vec<ManualBlockInput>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub goals: usize,
    pub schedules: usize,
    pub tasks: usize,
    pub events: usize,
    pub blocks: usize,
}
