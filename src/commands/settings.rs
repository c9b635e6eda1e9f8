use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::settings::SchedulerSettings;
use crate::services::schedule_utils;
use crate::services::settings_service::SettingsUpdateInput;

use super::{run_blocking, AppState, CommandResult};

pub async fn settings_get(state: &AppState) -> CommandResult<SchedulerSettings> {
    let service = state.settings();
    run_blocking("settings", move || service.get()).await
}

pub async fn settings_update(
    state: &AppState,
    payload: SettingsUpdatePayload,
) -> CommandResult<SchedulerSettings> {
    let service = state.settings();
    run_blocking("settings", move || service.update(payload.into_input()?)).await
}

pub async fn settings_reset(state: &AppState) -> CommandResult<SchedulerSettings> {
    let service = state.settings();
    run_blocking("settings", move || service.reset()).await
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdatePayload {
    #[serde(default)]
    pub workday_start: Option<String>,
    #[serde(default)]
    pub workday_end: Option<String>,
    #[serde(default)]
    pub workday_start_minute: Option<i16>,
    #[serde(default)]
    pub workday_end_minute: Option<i16>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl SettingsUpdatePayload {
    /// "HH:MM" fields win over raw minute fields.
    fn into_input(self) -> AppResult<SettingsUpdateInput> {
        Ok(SettingsUpdateInput {
            workday_start_minute: pick_minute(self.workday_start, self.workday_start_minute)?,
            workday_end_minute: pick_minute(self.workday_end, self.workday_end_minute)?,
            timezone: self.timezone,
        })
    }
}

fn pick_minute(hhmm: Option<String>, minute: Option<i16>) -> AppResult<Option<i16>> {
    match hhmm {
        Some(value) => {
            let minutes = schedule_utils::parse_hhmm(&value)?;
            i16::try_from(minutes)
                .map(Some)
                .map_err(|_| AppError::validation(format!("time {value} out of range")))
        }
        None => Ok(minute),
    }
}
