use crate::models::schedule::ScheduleRecord;
use crate::models::time_block::TimeBlockRecord;
use crate::services::schedule_utils;

use super::{run_blocking, AppState, CommandResult};

/// Blocks dated in `[start_date, end_date)`, both "YYYY-MM-DD".
pub async fn time_blocks_list(
    state: &AppState,
    start_date: String,
    end_date: String,
) -> CommandResult<Vec<TimeBlockRecord>> {
    let service = state.time_blocks();
    run_blocking("time block listing", move || {
        let start = schedule_utils::parse_date(&start_date)?;
        let end = schedule_utils::parse_date(&end_date)?;
        service.list_blocks_in_range(start, end)
    })
    .await
}

pub async fn schedules_list(state: &AppState) -> CommandResult<Vec<ScheduleRecord>> {
    let service = state.schedules();
    run_blocking("schedule listing", move || service.list_schedules()).await
}
