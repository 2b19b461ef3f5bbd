pub mod commands;
pub mod context;
pub mod prompt;
pub mod status;

pub use context::{AppContext, ConfigOverrides};
pub use status::Severity;
