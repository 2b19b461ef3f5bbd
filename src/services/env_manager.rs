use crate::domain::{
    CancelToken, EnvDetails, EnvError, EnvName, Environment, Invocation, OsFamily,
    PackageListing, RemoveOutcome, RuntimeVersion, Step, ToolRunner, activation_command_for,
    parse_packages,
};
use crate::services::NameLocks;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Values an `EnvManager` works against, injected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    pub base_dir: PathBuf,
    /// Interpreter providing `-m venv` and `-m jupyter`.
    pub host_python: PathBuf,
    pub kernel_package: String,
}

impl ManagerSettings {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            host_python: crate::infra::config::default_host_python(),
            kernel_package: crate::domain::KERNEL_SUPPORT_PACKAGE.to_string(),
        }
    }
}

/// Creates, populates, inspects and removes environment/kernel pairs.
///
/// Create, remove and install hold a per-name lock for their whole run, so
/// concurrent calls for one name are serialized while different names
/// proceed in parallel.
#[derive(Debug, Clone)]
pub struct EnvManager {
    runner: Arc<dyn ToolRunner>,
    settings: ManagerSettings,
    locks: Arc<NameLocks>,
}

impl EnvManager {
    pub fn new(runner: Arc<dyn ToolRunner>, settings: ManagerSettings) -> Self {
        Self::with_locks(runner, settings, Arc::new(NameLocks::new()))
    }

    /// Shares a lock registry between managers pointed at the same base dir.
    pub fn with_locks(
        runner: Arc<dyn ToolRunner>,
        settings: ManagerSettings,
        locks: Arc<NameLocks>,
    ) -> Self {
        Self {
            runner,
            settings,
            locks,
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn base_dir(&self) -> &Path {
        &self.settings.base_dir
    }

    pub fn locks(&self) -> &Arc<NameLocks> {
        &self.locks
    }

    /// Names of the environments under the base directory, sorted.
    pub fn list(&self) -> Vec<String> {
        list_environments(&self.settings.base_dir)
    }

    pub fn create(
        &self,
        name: &str,
        packages: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Environment, EnvError> {
        let name = EnvName::parse(name)?;
        let _guard = self.locks.acquire(name.as_str());

        let env = Environment::new(&self.settings.base_dir, name);
        if env.exists() {
            return Err(EnvError::AlreadyExists {
                name: env.name.to_string(),
                path: env.root.clone(),
            });
        }

        fs::create_dir_all(&self.settings.base_dir).map_err(|e| {
            EnvError::io(format!("creating {}", self.settings.base_dir.display()), e)
        })?;

        info!("Creating virtual environment '{}' at {:?}", env.name, env.root);

        match self.build(&env, packages, cancel) {
            Ok(()) => {
                info!("Kernel for '{}' registered", env.name);
                Ok(env)
            }
            Err(e) => {
                error!("Creating '{}' failed: {}", env.name, e);
                discard(&env);
                Err(e)
            }
        }
    }

    fn build(
        &self,
        env: &Environment,
        packages: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<(), EnvError> {
        self.run(
            &Invocation::create_venv(&self.settings.host_python, &env.root),
            cancel,
        )?;

        let python = env.interpreter();
        if !python.exists() {
            return Err(EnvError::Tool {
                step: Step::ResolveInterpreter,
                detail: format!("no interpreter at {}", python.display()),
            });
        }

        debug!("Upgrading pip in '{}'", env.name);
        self.run(&Invocation::upgrade_pip(&python), cancel)?;

        debug!("Installing {} in '{}'", self.settings.kernel_package, env.name);
        self.run(
            &Invocation::pip_install(
                Step::InstallKernelSupport,
                &python,
                std::slice::from_ref(&self.settings.kernel_package),
            ),
            cancel,
        )?;

        let extra = packages.map(parse_packages).unwrap_or_default();
        if !extra.is_empty() {
            info!("Installing {} into '{}'", extra.join(", "), env.name);
            self.run(
                &Invocation::pip_install(Step::InstallPackages, &python, &extra),
                cancel,
            )?;
        }

        self.run(&Invocation::register_kernel(&python, &env.name), cancel)?;

        Ok(())
    }

    /// Unregisters the kernel (best effort) and deletes the environment directory.
    pub fn remove(&self, name: &str, cancel: &CancelToken) -> Result<RemoveOutcome, EnvError> {
        let name = EnvName::parse(name)?;
        let _guard = self.locks.acquire(name.as_str());

        let env = self.existing(name)?;

        info!("Uninstalling Jupyter kernel '{}'...", env.name);
        let kernel = self.run(
            &Invocation::unregister_kernel(&self.settings.host_python, &env.name),
            cancel,
        );

        let outcome = match kernel {
            Ok(_) => RemoveOutcome::Removed,
            Err(e) => {
                warn!("Kernel '{}' may still be registered: {}", env.name, e);
                RemoveOutcome::KernelNotRemoved {
                    detail: e.to_string(),
                }
            }
        };

        if env.exists() {
            info!("Removing virtual environment directory {:?}", env.root);
            fs::remove_dir_all(&env.root)
                .map_err(|e| EnvError::io(format!("removing {}", env.root.display()), e))?;
        }

        Ok(outcome)
    }

    /// Installs a comma-separated package list; returns the tokens passed to pip.
    pub fn install_packages(
        &self,
        name: &str,
        packages: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<String>, EnvError> {
        let name = EnvName::parse(name)?;
        let tokens = parse_packages(packages);
        if tokens.is_empty() {
            return Err(EnvError::EmptyPackageList);
        }

        let _guard = self.locks.acquire(name.as_str());
        let env = self.existing(name)?;

        info!("Installing {} into '{}'", tokens.join(", "), env.name);
        self.run(
            &Invocation::pip_install(Step::InstallPackages, &env.interpreter(), &tokens),
            cancel,
        )?;

        Ok(tokens)
    }

    pub fn list_installed_packages(&self, name: &str, cancel: &CancelToken) -> PackageListing {
        let env = match EnvName::parse(name).and_then(|name| self.existing(name)) {
            Ok(env) => env,
            Err(e) => {
                debug!("package listing unavailable: {}", e);
                return PackageListing::Unavailable;
            }
        };

        match self.run(&Invocation::list_packages(&env.interpreter()), cancel) {
            Ok(output) => PackageListing::Packages(
                output
                    .stdout_lossy()
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            Err(e) => {
                debug!("package listing for '{}' unavailable: {}", env.name, e);
                PackageListing::Unavailable
            }
        }
    }

    /// `pip freeze` output, byte for byte.
    pub fn export_requirements(&self, name: &str, cancel: &CancelToken) -> Result<Vec<u8>, EnvError> {
        let env = self.existing(EnvName::parse(name)?)?;
        let output = self.run(&Invocation::freeze(&env.interpreter()), cancel)?;
        Ok(output.stdout)
    }

    pub fn runtime_version(&self, name: &str, cancel: &CancelToken) -> RuntimeVersion {
        let Ok(name) = EnvName::parse(name) else {
            return RuntimeVersion::Unknown;
        };
        let env = Environment::new(&self.settings.base_dir, name);

        match self.run(&Invocation::runtime_version(&env.interpreter()), cancel) {
            Ok(output) => {
                // Interpreters before 3.4 print the version on stderr.
                let stdout = output.stdout_lossy();
                let version = match stdout.trim() {
                    "" => output.stderr.trim(),
                    out => out,
                };
                if version.is_empty() {
                    RuntimeVersion::Unknown
                } else {
                    RuntimeVersion::Known(version.to_string())
                }
            }
            Err(e) => {
                debug!("version of '{}' unknown: {}", env.name, e);
                RuntimeVersion::Unknown
            }
        }
    }

    pub fn describe(&self, name: &str, cancel: &CancelToken) -> Result<EnvDetails, EnvError> {
        let env = self.existing(EnvName::parse(name)?)?;
        let version = self.runtime_version(env.name.as_str(), cancel);

        Ok(EnvDetails {
            name: env.name,
            root: env.root,
            version,
        })
    }

    pub fn activation_command(&self, name: &str) -> Result<String, EnvError> {
        let env = self.existing(EnvName::parse(name)?)?;
        Ok(activation_command_for(&env.root, OsFamily::host()))
    }

    fn existing(&self, name: EnvName) -> Result<Environment, EnvError> {
        let env = Environment::new(&self.settings.base_dir, name);
        if !env.exists() {
            return Err(EnvError::NotFound {
                name: env.name.to_string(),
                path: env.root,
            });
        }
        Ok(env)
    }

    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancelToken,
    ) -> Result<crate::domain::ToolOutput, EnvError> {
        debug!("{}: {}", invocation.step, invocation.display());
        self.runner.run(invocation, cancel)
    }
}

/// Immediate subdirectories of `base_dir`, sorted; any I/O error yields empty.
pub fn list_environments(base_dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cannot read {:?}: {}", base_dir, e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

// Best-effort removal of a half-built environment.
fn discard(env: &Environment) {
    if !env.root.exists() {
        return;
    }

    match fs::remove_dir_all(&env.root) {
        Ok(()) => info!("Removed partial environment {:?}", env.root),
        Err(e) => warn!(
            "Could not remove partial environment {:?}: {}",
            env.root, e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::test_support::MockRunner;
    use tempfile::TempDir;

    fn create_test_manager() -> (EnvManager, Arc<MockRunner>, TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRunner::new());
        let manager = EnvManager::new(mock.clone(), ManagerSettings::new(temp.path().join("venvs")));
        (manager, mock, temp)
    }

    #[test]
    fn test_create_runs_steps_in_order() {
        let (manager, mock, _temp) = create_test_manager();

        let env = manager
            .create("ml", Some("numpy, pandas"), &CancelToken::new())
            .unwrap();

        assert!(env.root.is_dir());
        assert_eq!(
            mock.get_steps(),
            vec![
                Step::CreateVenv,
                Step::UpgradePip,
                Step::InstallKernelSupport,
                Step::InstallPackages,
                Step::RegisterKernel,
            ]
        );
        assert_eq!(manager.list(), vec!["ml"]);
    }

    #[test]
    fn test_create_without_packages_skips_install() {
        let (manager, mock, _temp) = create_test_manager();

        manager.create("bare", Some(" , "), &CancelToken::new()).unwrap();

        assert!(!mock.get_steps().contains(&Step::InstallPackages));
    }

    #[test]
    fn test_create_installs_configured_kernel_package() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRunner::new());
        let mut settings = ManagerSettings::new(temp.path());
        settings.kernel_package = "ipykernel==6.29.0".into();
        let manager = EnvManager::new(mock.clone(), settings);

        manager.create("pinned", None, &CancelToken::new()).unwrap();

        let install = mock.invocations_for(Step::InstallKernelSupport);
        assert_eq!(
            install[0].args_lossy(),
            vec!["-m", "pip", "install", "ipykernel==6.29.0"]
        );
    }

    #[test]
    fn test_create_rejects_invalid_name_without_touching_disk() {
        let (manager, mock, _temp) = create_test_manager();

        let err = manager.create("bad name", None, &CancelToken::new()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!manager.base_dir().exists());
        assert!(mock.get_steps().is_empty());
    }

    #[test]
    fn test_create_cleans_up_when_pip_fails() {
        let (manager, mock, _temp) = create_test_manager();
        mock.set_fail_on(Step::UpgradePip);

        let err = manager.create("broken", None, &CancelToken::new()).unwrap_err();

        assert_eq!(err.step(), Some(Step::UpgradePip));
        assert!(!manager.base_dir().join("broken").exists());
        assert!(manager.list().is_empty());
    }

    #[test]
    fn test_create_fails_when_interpreter_missing() {
        let (manager, mock, _temp) = create_test_manager();
        mock.set_skip_interpreter(true);

        let err = manager.create("hollow", None, &CancelToken::new()).unwrap_err();

        assert_eq!(err.step(), Some(Step::ResolveInterpreter));
        assert!(!manager.base_dir().join("hollow").exists());
        assert_eq!(mock.get_steps(), vec![Step::CreateVenv]);
    }

    #[test]
    fn test_remove_missing_env_makes_no_calls() {
        let (manager, mock, _temp) = create_test_manager();

        let err = manager.remove("ghost", &CancelToken::new()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::State);
        assert!(mock.get_steps().is_empty());
    }

    #[test]
    fn test_remove_reports_kernel_failure_as_warning() {
        let (manager, mock, _temp) = create_test_manager();
        manager.create("ml", None, &CancelToken::new()).unwrap();
        mock.set_fail_on(Step::UnregisterKernel);

        let outcome = manager.remove("ml", &CancelToken::new()).unwrap();

        assert!(outcome.is_warning());
        assert!(!manager.base_dir().join("ml").exists());
    }

    #[test]
    fn test_install_rejects_empty_list() {
        let (manager, mock, _temp) = create_test_manager();
        manager.create("ml", None, &CancelToken::new()).unwrap();
        mock.clear_history();

        let err = manager
            .install_packages("ml", "  , ,", &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, EnvError::EmptyPackageList));
        assert!(mock.get_steps().is_empty());
    }

    #[test]
    fn test_runtime_version_unknown_for_missing_env() {
        let temp = tempfile::tempdir().unwrap();
        let manager = EnvManager::new(
            Arc::new(crate::infra::ProcessRunner::new()),
            ManagerSettings::new(temp.path()),
        );

        assert_eq!(
            manager.runtime_version("nothing_here", &CancelToken::new()),
            RuntimeVersion::Unknown
        );
    }

    #[test]
    fn test_list_skips_plain_files() {
        let (manager, _mock, _temp) = create_test_manager();
        fs::create_dir_all(manager.base_dir().join("b_env")).unwrap();
        fs::create_dir_all(manager.base_dir().join("a_env")).unwrap();
        fs::write(manager.base_dir().join("notes.txt"), "x").unwrap();

        assert_eq!(manager.list(), vec!["a_env", "b_env"]);
    }
}
