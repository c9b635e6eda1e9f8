use serde::{Deserialize, Serialize};

/// A named weekly availability pattern, e.g. "Deep Work" on weekday mornings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub id: String,
    pub name: String,
    pub windows: Vec<ScheduleWindowRecord>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleWindowRecord {
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    /// "HH:MM"
    pub start_time: String,
    /// "HH:MM"
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCreateInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub windows: Vec<ScheduleWindowRecord>,
}
