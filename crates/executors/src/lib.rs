pub mod command_builder;
pub mod profile;
pub mod runner;
pub mod script;

pub use profile::{LoadProfile, Stage};
pub use runner::{K6Runner, RunError, RunnerConfig};
