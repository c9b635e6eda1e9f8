use serde::{Deserialize, Serialize};

pub const CREATED_BY_AGENT: &str = "agent";
pub const CREATED_BY_USER: &str = "user";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlockRecord {
    pub id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    /// Local calendar date, "YYYY-MM-DD".
    pub date: String,
    /// "HH:MM"
    pub start_time: String,
    /// "HH:MM"
    pub end_time: String,
    pub is_auto_scheduled: bool,
    #[serde(default)]
    pub chunk_index: Option<u32>,
    #[serde(default)]
    pub chunk_total: Option<u32>,
    pub created_by: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManualBlockInput {
    #[serde(default)]
    pub task_id: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}
