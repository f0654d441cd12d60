//! Screen-watching idle helper.
//!
//! Captures the screen, clicks known targets, presses a kick key when a kick
//! target appears and holds the mouse button after a long quiet period.

pub mod app;
pub mod automation;
pub mod core;
pub mod error;
pub mod logging;
pub mod settings;
pub mod ui;
