pub mod auto_schedule_service;
pub mod availability;
pub mod calendar_service;
pub mod goal_service;
pub mod import_service;
pub mod placement_engine;
pub mod schedule_service;
pub mod schedule_utils;
pub mod settings_service;
pub mod task_prioritizer;
pub mod task_service;
pub mod time_block_service;
