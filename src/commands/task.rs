use crate::models::task::TaskRecord;

use super::{run_blocking, AppState, CommandResult};

pub async fn tasks_list(state: &AppState) -> CommandResult<Vec<TaskRecord>> {
    let service = state.tasks();
    run_blocking("task listing", move || service.list_tasks()).await
}
