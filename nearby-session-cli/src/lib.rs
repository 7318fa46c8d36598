pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use infrastructure::{CliError, LogConfig, Result};
