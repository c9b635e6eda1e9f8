pub mod calendar_event_repository;
pub mod goal_repository;
pub mod schedule_repository;
pub mod settings_repository;
pub mod task_repository;
pub mod time_block_repository;
