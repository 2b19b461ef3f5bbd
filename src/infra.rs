pub mod config;
pub mod process_runner;

pub use config::{AppConfig, ResolvedConfig};
pub use process_runner::ProcessRunner;
