use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::db::repositories::settings_repository::{AppSettingRow, SettingsRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::settings::SchedulerSettings;
use crate::services::availability::WorkdayBounds;
use crate::services::schedule_utils::{self, MINUTES_PER_DAY};

const KEY_WORKDAY_START: &str = "workday_start_minute";
const KEY_WORKDAY_END: &str = "workday_end_minute";
const KEY_TIMEZONE: &str = "timezone";
const ALL_KEYS: [&str; 3] = [KEY_WORKDAY_START, KEY_WORKDAY_END, KEY_TIMEZONE];

const DEFAULT_WORKDAY_START: i16 = 6 * 60;
const DEFAULT_WORKDAY_END: i16 = 22 * 60;
const FALLBACK_TIMEZONE: &str = "UTC";

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdateInput {
    pub workday_start_minute: Option<i16>,
    pub workday_end_minute: Option<i16>,
    pub timezone: Option<String>,
}

pub struct SettingsService {
    db: DbPool,
    default_timezone: String,
    cache: RwLock<Option<SchedulerSettings>>,
}

impl SettingsService {
    /// Unset time zones resolve to the host zone.
    pub fn new(db: DbPool) -> Self {
        Self::with_default_timezone(db, system_timezone())
    }

    /// Uses `timezone` whenever no zone is stored. Unknown names degrade to UTC.
    pub fn with_default_timezone(db: DbPool, timezone: impl Into<String>) -> Self {
        Self {
            db,
            default_timezone: canonical_timezone(Some(timezone.into())),
            cache: RwLock::new(None),
        }
    }

    pub fn get(&self) -> AppResult<SchedulerSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings_from_db()?;
        self.store_cache(Some(settings.clone()));
        Ok(settings)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<SchedulerSettings> {
        let mut current = self.get()?;

        if let Some(start) = input.workday_start_minute {
            ensure_valid_minute(start)?;
            current.workday_start_minute = start;
        }
        if let Some(end) = input.workday_end_minute {
            ensure_valid_minute(end)?;
            current.workday_end_minute = end;
        }
        if current.workday_start_minute >= current.workday_end_minute {
            return Err(AppError::validation(
                "workday start must be earlier than workday end",
            ));
        }

        let timezone = match input.timezone.as_deref().map(str::trim) {
            Some(name) => {
                let tz = schedule_utils::parse_timezone(name)?;
                Some(tz.name().to_string())
            }
            None => None,
        };
        if let Some(name) = timezone.as_ref() {
            current.timezone = name.clone();
        }

        let now = Utc::now().to_rfc3339();
        self.db.with_immediate_transaction(|tx| {
            if let Some(value) = input.workday_start_minute {
                SettingsRepository::upsert(tx, KEY_WORKDAY_START, &value.to_string(), &now)?;
            }
            if let Some(value) = input.workday_end_minute {
                SettingsRepository::upsert(tx, KEY_WORKDAY_END, &value.to_string(), &now)?;
            }
            if let Some(value) = timezone.as_deref() {
                SettingsRepository::upsert(tx, KEY_TIMEZONE, value, &now)?;
            }
            Ok(())
        })?;
        current.updated_at = now;

        info!(
            target: "app::settings",
            start = current.workday_start_minute,
            end = current.workday_end_minute,
            timezone = %current.timezone,
            "scheduler settings updated"
        );

        self.store_cache(Some(current.clone()));
        Ok(current)
    }

    /// Drops every stored override so the defaults apply again.
    pub fn reset(&self) -> AppResult<SchedulerSettings> {
        self.db.with_connection(|conn| {
            for key in ALL_KEYS {
                SettingsRepository::delete(conn, key)?;
            }
            Ok(())
        })?;
        self.store_cache(None);
        self.get()
    }

    pub fn workday_bounds(&self) -> AppResult<WorkdayBounds> {
        let settings = self.get()?;
        Ok(WorkdayBounds {
            start: i64::from(settings.workday_start_minute),
            end: i64::from(settings.workday_end_minute),
        })
    }

    pub fn timezone(&self) -> AppResult<Tz> {
        let settings = self.get()?;
        schedule_utils::parse_timezone(&settings.timezone)
    }

    fn store_cache(&self, value: Option<SchedulerSettings>) {
        if let Ok(mut guard) = self.cache.write() {
            *guard = value;
        }
    }

    fn load_settings_from_db(&self) -> AppResult<SchedulerSettings> {
        self.db.with_connection(|conn| {
            let rows = SettingsRepository::list(conn)?;
            let mut latest_updated_at: Option<String> = None;
            let mut map: HashMap<String, AppSettingRow> = HashMap::new();
            for row in rows {
                latest_updated_at = match latest_updated_at {
                    Some(current) if current >= row.updated_at => Some(current),
                    _ => Some(row.updated_at.clone()),
                };
                map.insert(row.key.clone(), row);
            }

            let mut start = stored_minute(&map, KEY_WORKDAY_START).unwrap_or(DEFAULT_WORKDAY_START);
            let mut end = stored_minute(&map, KEY_WORKDAY_END).unwrap_or(DEFAULT_WORKDAY_END);
            if start >= end {
                warn!(
                    target: "app::settings",
                    start,
                    end,
                    "stored workday range invalid, falling back to defaults"
                );
                start = DEFAULT_WORKDAY_START;
                end = DEFAULT_WORKDAY_END;
            }

            let timezone = match map.get(KEY_TIMEZONE) {
                Some(row) => match row.value.parse::<Tz>() {
                    Ok(tz) => tz.name().to_string(),
                    Err(_) => {
                        warn!(
                            target: "app::settings",
                            timezone = %row.value,
                            "stored timezone not recognized, using default"
                        );
                        self.default_timezone.clone()
                    }
                },
                None => self.default_timezone.clone(),
            };

            Ok(SchedulerSettings {
                workday_start_minute: start,
                workday_end_minute: end,
                timezone,
                updated_at: latest_updated_at.unwrap_or_else(|| Utc::now().to_rfc3339()),
            })
        })
    }
}

/// IANA name of the host zone, or UTC when the platform does not report one.
pub fn system_timezone() -> String {
    canonical_timezone(iana_time_zone::get_timezone().ok())
}

fn canonical_timezone(name: Option<String>) -> String {
    match name.as_deref().map(str::trim).map(str::parse::<Tz>) {
        Some(Ok(tz)) => tz.name().to_string(),
        Some(Err(_)) => {
            warn!(
                target: "app::settings",
                timezone = name.as_deref().unwrap_or_default(),
                "time zone not recognized, using UTC"
            );
            FALLBACK_TIMEZONE.to_string()
        }
        None => {
            warn!(target: "app::settings", "host time zone unavailable, using UTC");
            FALLBACK_TIMEZONE.to_string()
        }
    }
}

fn stored_minute(map: &HashMap<String, AppSettingRow>, key: &str) -> Option<i16> {
    let value = map.get(key)?.value.parse::<i16>().ok()?;
    if ensure_valid_minute(value).is_ok() {
        Some(value)
    } else {
        warn!(target: "app::settings", key, value, "stored minute out of range, ignoring");
        None
    }
}

fn ensure_valid_minute(value: i16) -> AppResult<()> {
    let minutes = i64::from(value);
    if !(0..=MINUTES_PER_DAY).contains(&minutes) {
        return Err(AppError::validation("workday minutes must be within 0..=1440"));
    }
    if !schedule_utils::is_on_grid(minutes) {
        return Err(AppError::validation(format!(
            "workday minutes must be a multiple of {}",
            schedule_utils::SNAP_MINUTES
        )));
    }
    Ok(())
}
