use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSettings {
    /// Earliest placeable minute of the working day.
    pub workday_start_minute: i16,
    /// End (exclusive) of the working day in minutes.
    pub workday_end_minute: i16,
    /// IANA zone that defines "local" dates and times.
    pub timezone: String,
    pub updated_at: String,
}
