use super::error::EnvError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Package that makes an environment usable as a Jupyter kernel.
pub const KERNEL_SUPPORT_PACKAGE: &str = "ipykernel";

/// Host layout family that decides where a venv keeps its interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Posix,
}

impl OsFamily {
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    fn scripts_dir(self) -> &'static str {
        match self {
            Self::Windows => "Scripts",
            Self::Posix => "bin",
        }
    }
}

/// Interpreter inside `env_root` for the current host.
///
/// Every call site that needs the environment's Python goes through here.
pub fn interpreter_path(env_root: &Path) -> PathBuf {
    interpreter_path_for(env_root, OsFamily::host())
}

pub fn interpreter_path_for(env_root: &Path, family: OsFamily) -> PathBuf {
    let exe = match family {
        OsFamily::Windows => "python.exe",
        OsFamily::Posix => "python",
    };
    env_root.join(family.scripts_dir()).join(exe)
}

/// Shell command a user runs to enter the environment.
pub fn activation_command_for(env_root: &Path, family: OsFamily) -> String {
    let script = env_root.join(family.scripts_dir()).join("activate");
    match family {
        OsFamily::Windows => script.display().to_string(),
        OsFamily::Posix => format!("source {}", script.display()),
    }
}

/// Splits a comma-separated package list into trimmed, non-empty tokens.
pub fn parse_packages(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|pkg| !pkg.is_empty())
        .map(String::from)
        .collect()
}

/// Environment name restricted to ASCII letters, digits and underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvName(String);

impl EnvName {
    pub fn parse(raw: &str) -> Result<Self, EnvError> {
        if raw.is_empty() {
            return Err(EnvError::InvalidName(raw.to_string()));
        }

        if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(EnvError::InvalidName(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label shown by notebook front ends for the registered kernel.
    pub fn kernel_display_name(&self) -> String {
        format!("Python ({})", self.0)
    }
}

impl fmt::Display for EnvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EnvName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A named environment rooted under the base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: EnvName,
    pub root: PathBuf,
}

impl Environment {
    pub fn new(base_dir: &Path, name: EnvName) -> Self {
        let root = base_dir.join(name.as_str());
        Self { name, root }
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    pub fn interpreter(&self) -> PathBuf {
        interpreter_path(&self.root)
    }
}

/// Result of asking an environment's interpreter for its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeVersion {
    Known(String),
    Unknown,
}

impl RuntimeVersion {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(version) => version,
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installed packages, or a marker that the query could not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageListing {
    Packages(Vec<String>),
    Unavailable,
}

impl PackageListing {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Packages(_))
    }

    /// Freeze lines, with `Unavailable` collapsed to an empty list.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Self::Packages(lines) => lines,
            Self::Unavailable => Vec::new(),
        }
    }
}

/// How a removal ended when the directory itself was deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Directory deleted, but the kernelspec may still be registered.
    KernelNotRemoved { detail: String },
}

impl RemoveOutcome {
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::KernelNotRemoved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvDetails {
    pub name: EnvName,
    pub root: PathBuf,
    pub version: RuntimeVersion,
}
