pub mod context;
pub mod cycle;
pub mod detection;
pub mod idle;
pub mod interaction;
pub mod supervisor;
pub mod templates;
