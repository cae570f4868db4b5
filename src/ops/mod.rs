pub mod busy_task;
pub mod load_control;
