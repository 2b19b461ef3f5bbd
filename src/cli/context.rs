use crate::domain::ToolRunner;
use crate::infra::config::{AppConfig, ResolvedConfig, load_app_config};
use crate::infra::ProcessRunner;
use crate::services::{EnvManager, ManagerSettings, TaskQueue};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Values given on the command line (or via their environment variables).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub venv_dir: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    fn into_app_config(self) -> AppConfig {
        let mut config = AppConfig::default();
        config.environments.base_dir = self.venv_dir.map(|p| p.to_string_lossy().into_owned());
        config.python.interpreter = self.python.map(|p| p.to_string_lossy().into_owned());
        config.tools.timeout_secs = self.timeout_secs;
        config
    }
}

/// Everything a command handler needs, built once at startup.
pub struct AppContext {
    pub config: ResolvedConfig,
    pub manager: EnvManager,
    pub queue: TaskQueue,
}

impl AppContext {
    pub fn load(config_dir: &Path, overrides: ConfigOverrides, jobs: usize) -> Result<Self> {
        let config = resolve_config(config_dir, overrides)?;
        let runner = Arc::new(ProcessRunner::with_timeout(config.timeout));
        Self::assemble(config, runner, jobs)
    }

    /// Same as `load`, with the external tools replaced.
    pub fn with_runner(
        config_dir: &Path,
        overrides: ConfigOverrides,
        runner: Arc<dyn ToolRunner>,
        jobs: usize,
    ) -> Result<Self> {
        let config = resolve_config(config_dir, overrides)?;
        Self::assemble(config, runner, jobs)
    }

    fn assemble(config: ResolvedConfig, runner: Arc<dyn ToolRunner>, jobs: usize) -> Result<Self> {
        let settings = ManagerSettings {
            base_dir: config.base_dir.clone(),
            host_python: config.host_python.clone(),
            kernel_package: config.kernel_package.clone(),
        };

        Ok(Self {
            manager: EnvManager::new(runner, settings),
            queue: TaskQueue::new(jobs)?,
            config,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }
}

/// Flags beat the config file; the config file beats built-in defaults.
pub fn resolve_config(config_dir: &Path, overrides: ConfigOverrides) -> Result<ResolvedConfig> {
    let mut config = load_app_config(config_dir)?;
    config.merge(overrides.into_app_config());

    let resolved = config.resolve()?;
    debug!("resolved configuration: {:?}", resolved);
    Ok(resolved)
}
