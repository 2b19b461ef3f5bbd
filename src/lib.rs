pub mod cli;
pub mod domain;
pub mod infra;
pub mod services;

// Make test_support available for integration tests
pub mod test_support;

pub use domain::{
    CancelToken, EnvError, EnvName, Environment, Invocation, PackageListing, RemoveOutcome,
    RuntimeVersion, Step, ToolRunner, interpreter_path,
};
pub use infra::ProcessRunner;
pub use services::{EnvManager, ManagerSettings, NameLocks, TaskQueue};
