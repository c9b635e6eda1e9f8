use crate::models::auto_schedule::{GenerateScheduleInput, ScheduleOutcome};

use super::{run_blocking, AppState, CommandResult};

pub async fn auto_schedule_generate(
    state: &AppState,
    payload: GenerateScheduleInput,
) -> CommandResult<ScheduleOutcome> {
    let service = state.auto_scheduler();
    run_blocking("auto-schedule", move || service.generate_schedule(payload)).await
}
