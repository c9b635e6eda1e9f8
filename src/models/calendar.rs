use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyStatus {
    Busy,
    Free,
    Tentative,
}

impl BusyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BusyStatus::Busy => "busy",
            BusyStatus::Free => "free",
            BusyStatus::Tentative => "tentative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "busy" => Some(BusyStatus::Busy),
            "free" => Some(BusyStatus::Free),
            "tentative" => Some(BusyStatus::Tentative),
            _ => None,
        }
    }
}

/// An imported calendar event. Instants are stored normalized to UTC RFC 3339
/// so that range queries can compare them as text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventRecord {
    pub id: String,
    pub title: String,
    pub start_at: String,
    pub end_at: String,
    pub busy_status: BusyStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventInput {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    /// RFC 3339 with offset.
    pub start_at: String,
    pub end_at: String,
    #[serde(default)]
    pub busy_status: Option<BusyStatus>,
}
