use super::cancel::CancelToken;
use super::error::EnvError;
use super::invocation::Invocation;
use std::borrow::Cow;
use std::fmt::Debug;

/// Captured output of a successful external call.
///
/// `stdout` keeps the raw bytes; `pip freeze` lines can carry non-UTF-8 paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    /// Standard output decoded for display.
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }
}

/// Trait for running the external environment/package/kernel tools
pub trait ToolRunner: Send + Sync + Debug {
    /// Run an invocation to completion.
    ///
    /// Zero exit is `Ok`; a non-zero exit, spawn failure, timeout or
    /// cancellation is an `EnvError` carrying `invocation.step`.
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ToolOutput, EnvError>;
}
