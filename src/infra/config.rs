use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_JUNO_TOML_NAME: &str = "juno.toml";
pub const DEFAULT_JUNO_TOML: &str = include_str!("../../config/default_juno.toml");

/// Per-invocation limit used when neither the config nor the CLI sets one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_dir() -> PathBuf {
    home_dir().join(".config").join("juno")
}

/// Where environments live when nothing overrides it.
pub fn default_base_dir() -> PathBuf {
    home_dir().join(".jupyter_venvs")
}

pub fn default_host_python() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("python")
    } else {
        PathBuf::from("python3")
    }
}

pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    fs::create_dir_all(config_dir).with_context(|| format!("creating {:?}", config_dir))
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct EnvironmentsConfig {
    pub base_dir: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct PythonConfig {
    /// Host interpreter that provides `venv` and `jupyter`.
    pub interpreter: Option<String>,
    pub kernel_package: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ToolsConfig {
    /// Seconds before a single external call is killed; 0 disables the limit.
    pub timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub environments: EnvironmentsConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Fully resolved settings, every field filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub base_dir: PathBuf,
    pub host_python: PathBuf,
    pub kernel_package: String,
    pub timeout: Option<Duration>,
}

impl AppConfig {
    /// Merges another AppConfig into self.
    /// Values from `other` overwrite values in `self` if present.
    pub fn merge(&mut self, other: AppConfig) {
        if let Some(dir) = other.environments.base_dir {
            self.environments.base_dir = Some(dir);
        }
        if let Some(python) = other.python.interpreter {
            self.python.interpreter = Some(python);
        }
        if let Some(pkg) = other.python.kernel_package {
            self.python.kernel_package = Some(pkg);
        }
        if let Some(secs) = other.tools.timeout_secs {
            self.tools.timeout_secs = Some(secs);
        }
    }

    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let base_dir = match &self.environments.base_dir {
            Some(raw) => expand_path(raw)?,
            None => default_base_dir(),
        };

        let host_python = match &self.python.interpreter {
            Some(raw) => expand_path(raw)?,
            None => default_host_python(),
        };

        let kernel_package = self
            .python
            .kernel_package
            .clone()
            .unwrap_or_else(|| crate::domain::KERNEL_SUPPORT_PACKAGE.to_string());
        if kernel_package.trim().is_empty() {
            bail!("python.kernel_package must not be empty");
        }

        let timeout = match self.tools.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(ResolvedConfig {
            base_dir,
            host_python,
            kernel_package,
            timeout,
        })
    }
}

/// Expands `~` and `$VAR` in a configured path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("empty path in configuration");
    }

    let expanded =
        shellexpand::full(raw).with_context(|| format!("expanding path {:?}", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

pub fn install_default_config(target_dir: &Path) -> Result<bool> {
    ensure_config_dir(target_dir)?;

    let target = target_dir.join(DEFAULT_JUNO_TOML_NAME);
    if target.exists() {
        return Ok(false);
    }

    fs::write(&target, DEFAULT_JUNO_TOML)
        .with_context(|| format!("writing template to {:?}", target))?;

    Ok(true)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig> {
    let path = config_dir.join(DEFAULT_JUNO_TOML_NAME);
    if !path.exists() {
        debug!("no config at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("parsing {:?}", path))?;

    Ok(config)
}
