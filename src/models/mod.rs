pub mod auto_schedule;
pub mod calendar;
pub mod fixture;
pub mod goal;
pub mod schedule;
pub mod settings;
pub mod task;
pub mod time_block;
