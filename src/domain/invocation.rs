use super::environment::EnvName;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of each external call the orchestrator makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CreateVenv,
    ResolveInterpreter,
    UpgradePip,
    InstallKernelSupport,
    InstallPackages,
    RegisterKernel,
    UnregisterKernel,
    ListPackages,
    Freeze,
    RuntimeVersion,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Self::CreateVenv => "virtual environment creation",
            Self::ResolveInterpreter => "interpreter lookup",
            Self::UpgradePip => "pip upgrade",
            Self::InstallKernelSupport => "kernel support installation",
            Self::InstallPackages => "package installation",
            Self::RegisterKernel => "kernel registration",
            Self::UnregisterKernel => "kernel unregistration",
            Self::ListPackages => "package listing",
            Self::Freeze => "requirements freeze",
            Self::RuntimeVersion => "version query",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One external process call: program plus argument vector, never a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub step: Step,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    fn new<I, S>(step: Step, program: &Path, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self {
            step,
            program: program.to_path_buf(),
            args: args
                .into_iter()
                .map(|item| item.as_ref().to_os_string())
                .collect(),
        }
    }

    /// `<host_python> -m venv <root>`
    pub fn create_venv(host_python: &Path, root: &Path) -> Self {
        Self::new(
            Step::CreateVenv,
            host_python,
            [OsStr::new("-m"), OsStr::new("venv"), root.as_os_str()],
        )
    }

    pub fn upgrade_pip(python: &Path) -> Self {
        Self::new(
            Step::UpgradePip,
            python,
            ["-m", "pip", "install", "--upgrade", "pip"],
        )
    }

    /// `<python> -m pip install <pkg>...`, one argument per package.
    pub fn pip_install(step: Step, python: &Path, packages: &[String]) -> Self {
        let mut args: Vec<OsString> = ["-m", "pip", "install"]
            .iter()
            .map(OsString::from)
            .collect();
        args.extend(packages.iter().map(OsString::from));

        Self {
            step,
            program: python.to_path_buf(),
            args,
        }
    }

    pub fn register_kernel(python: &Path, name: &EnvName) -> Self {
        Self::new(
            Step::RegisterKernel,
            python,
            [
                "-m".to_string(),
                "ipykernel".to_string(),
                "install".to_string(),
                "--user".to_string(),
                "--name".to_string(),
                name.to_string(),
                "--display-name".to_string(),
                name.kernel_display_name(),
            ],
        )
    }

    /// `<host_python> -m jupyter kernelspec uninstall <name> -y`
    pub fn unregister_kernel(host_python: &Path, name: &EnvName) -> Self {
        Self::new(
            Step::UnregisterKernel,
            host_python,
            ["-m", "jupyter", "kernelspec", "uninstall", name.as_str(), "-y"],
        )
    }

    pub fn list_packages(python: &Path) -> Self {
        Self::new(
            Step::ListPackages,
            python,
            ["-m", "pip", "list", "--format=freeze"],
        )
    }

    pub fn freeze(python: &Path) -> Self {
        Self::new(Step::Freeze, python, ["-m", "pip", "freeze"])
    }

    pub fn runtime_version(python: &Path) -> Self {
        Self::new(Step::RuntimeVersion, python, ["--version"])
    }

    /// Arguments as lossy UTF-8, handy for logs and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Readable command line for log output.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in self.args_lossy() {
            line.push(' ');
            if arg.contains(char::is_whitespace) {
                line.push_str(&format!("{arg:?}"));
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> EnvName {
        EnvName::parse(raw).unwrap()
    }

    #[test]
    fn register_kernel_uses_name_and_label() {
        let inv = Invocation::register_kernel(Path::new("/e/bin/python"), &name("ml"));
        assert_eq!(inv.step, Step::RegisterKernel);
        assert_eq!(
            inv.args_lossy(),
            vec![
                "-m",
                "ipykernel",
                "install",
                "--user",
                "--name",
                "ml",
                "--display-name",
                "Python (ml)"
            ]
        );
    }

    #[test]
    fn unregister_kernel_is_an_argument_vector() {
        let inv = Invocation::unregister_kernel(Path::new("python3"), &name("ml"));
        assert_eq!(inv.program, PathBuf::from("python3"));
        assert_eq!(
            inv.args_lossy(),
            vec!["-m", "jupyter", "kernelspec", "uninstall", "ml", "-y"]
        );
    }

    #[test]
    fn pip_install_passes_each_package_separately() {
        let packages = vec!["numpy".to_string(), "pandas>=2".to_string()];
        let inv = Invocation::pip_install(Step::InstallPackages, Path::new("py"), &packages);
        assert_eq!(
            inv.args_lossy(),
            vec!["-m", "pip", "install", "numpy", "pandas>=2"]
        );
    }

    #[test]
    fn create_venv_targets_root() {
        let inv = Invocation::create_venv(Path::new("python3"), Path::new("/base/ml"));
        assert_eq!(inv.args_lossy(), vec!["-m", "venv", "/base/ml"]);
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let inv = Invocation::register_kernel(Path::new("py"), &name("ml"));
        assert!(inv.display().ends_with("--display-name \"Python (ml)\""));
    }
}
