mod cancel;
mod environment;
pub mod error;
pub mod invocation;
pub mod traits;

pub use cancel::CancelToken;
pub use environment::{
    EnvDetails, EnvName, Environment, KERNEL_SUPPORT_PACKAGE, OsFamily, PackageListing,
    RemoveOutcome, RuntimeVersion, activation_command_for, interpreter_path, interpreter_path_for,
    parse_packages,
};
pub use error::{EnvError, ErrorKind};
pub use invocation::{Invocation, Step};
pub use traits::{ToolOutput, ToolRunner};
