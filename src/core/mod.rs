pub mod hotkey;
pub mod input;
pub mod keys;
pub mod platform;
pub mod screen_capture;
pub mod worker;
