pub mod control_panel;
pub mod help;
pub mod log_panel;
pub mod status;
