use crate::models::fixture::ImportSummary;

use super::{run_blocking, AppState, CommandResult};

/// Loads a JSON fixture of goals, schedules, tasks, events and manual blocks.
pub async fn import_fixture(state: &AppState, raw: String) -> CommandResult<ImportSummary> {
    let service = state.importer();
    run_blocking("import", move || service.import_json(&raw)).await
}
