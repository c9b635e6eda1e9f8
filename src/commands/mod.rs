pub mod auto_schedule;
pub mod import;
pub mod settings;
pub mod task;
pub mod time_blocks;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, warn};

use crate::db::DbPool;
use crate::error::AppError;
use crate::services::auto_schedule_service::AutoScheduleService;
use crate::services::import_service::ImportService;
use crate::services::schedule_service::ScheduleService;
use crate::services::settings_service::SettingsService;
use crate::services::task_service::TaskService;
use crate::services::time_block_service::TimeBlockService;

#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    task_service: Arc<TaskService>,
    settings_service: Arc<SettingsService>,
    schedule_service: Arc<ScheduleService>,
    time_block_service: Arc<TimeBlockService>,
    import_service: Arc<ImportService>,
    auto_schedule_service: Arc<AutoScheduleService>,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> Self {
        let settings_service = Arc::new(SettingsService::new(db_pool.clone()));
        let auto_schedule_service = Arc::new(AutoScheduleService::new(
            db_pool.clone(),
            Arc::clone(&settings_service),
        ));

        Self {
            task_service: Arc::new(TaskService::new(db_pool.clone())),
            schedule_service: Arc::new(ScheduleService::new(db_pool.clone())),
            time_block_service: Arc::new(TimeBlockService::new(db_pool.clone())),
            import_service: Arc::new(ImportService::new(db_pool.clone())),
            settings_service,
            auto_schedule_service,
            db_pool,
        }
    }

    pub fn tasks(&self) -> Arc<TaskService> {
        Arc::clone(&self.task_service)
    }

    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings_service)
    }

    pub fn schedules(&self) -> Arc<ScheduleService> {
        Arc::clone(&self.schedule_service)
    }

    pub fn time_blocks(&self) -> Arc<TimeBlockService> {
        Arc::clone(&self.time_block_service)
    }

    pub fn importer(&self) -> Arc<ImportService> {
        Arc::clone(&self.import_service)
    }

    pub fn auto_scheduler(&self) -> Arc<AutoScheduleService> {
        Arc::clone(&self.auto_schedule_service)
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation {
                message, details, ..
            } => CommandError::new("VALIDATION_ERROR", message, details),
            AppError::NotFound => {
                CommandError::new("NOT_FOUND", "the requested record does not exist", None)
            }
            AppError::Conflict { message } => {
                warn!(target: "app::command", %message, "conflict in command");
                CommandError::new("CONFLICT", message, None)
            }
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("DATABASE_ERROR", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("INVALID_PAYLOAD", error.to_string(), None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", "file system access failed", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}

/// Moves a blocking service call off the async runtime.
pub(crate) async fn run_blocking<T: Send + 'static>(
    label: &str,
    task: impl FnOnce() -> Result<T, AppError> + Send + 'static,
) -> CommandResult<T> {
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| CommandError::new("UNKNOWN", format!("{label} failed to run: {err}"), None))?
        .map_err(CommandError::from)
}
