use juno::domain::{ErrorKind, Step};
use juno::test_support::MockRunner;
use juno::{CancelToken, EnvError, EnvManager, ManagerSettings, PackageListing, RemoveOutcome, RuntimeVersion};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn create_manager() -> (EnvManager, Arc<MockRunner>, TempDir) {
    let temp = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRunner::new());
    let settings = ManagerSettings::new(temp.path().join("venvs"));
    let manager = EnvManager::new(mock.clone(), settings);
    (manager, mock, temp)
}

fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.is_dir() {
            for (name, bytes) in snapshot(&path) {
                files.push((format!("{}/{}", entry.file_name().to_string_lossy(), name), bytes));
            }
        } else {
            files.push((
                entry.file_name().to_string_lossy().into_owned(),
                fs::read(&path).unwrap(),
            ));
        }
    }
    files.sort();
    files
}

#[test]
fn test_create_then_list_contains_name_once() {
    let (manager, _mock, _temp) = create_manager();
    let cancel = CancelToken::new();

    for name in ["zeta", "Alpha_1", "beta"] {
        manager.create(name, None, &cancel).unwrap();
    }

    let names = manager.list();
    assert_eq!(names, vec!["Alpha_1", "beta", "zeta"]);
    assert_eq!(names.iter().filter(|n| n.as_str() == "beta").count(), 1);
}

#[test]
fn test_invalid_names_make_no_changes() {
    let (manager, mock, _temp) = create_manager();
    fs::create_dir_all(manager.base_dir()).unwrap();

    for bad in ["", "has space", "semi;colon", "../up", "name-with-dash"] {
        let err = manager.create(bad, Some("numpy"), &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{bad:?}");
    }

    assert!(manager.list().is_empty());
    assert!(mock.get_invocations().is_empty());
    assert!(!manager.base_dir().parent().unwrap().join("up").exists());
}

#[test]
fn test_create_existing_leaves_directory_untouched() {
    let (manager, mock, _temp) = create_manager();
    let existing = manager.base_dir().join("keep");
    fs::create_dir_all(existing.join("lib")).unwrap();
    fs::write(existing.join("pyvenv.cfg"), "home = /opt/python\n").unwrap();
    fs::write(existing.join("lib").join("data.bin"), [0u8, 1, 2, 255]).unwrap();
    let before = snapshot(&existing);

    let err = manager.create("keep", None, &CancelToken::new()).unwrap_err();

    assert!(matches!(err, EnvError::AlreadyExists { .. }));
    assert_eq!(snapshot(&existing), before);
    assert!(mock.get_invocations().is_empty());
}

#[test]
fn test_create_is_all_or_nothing() {
    for failing in [
        Step::CreateVenv,
        Step::UpgradePip,
        Step::InstallKernelSupport,
        Step::InstallPackages,
        Step::RegisterKernel,
    ] {
        let (manager, mock, _temp) = create_manager();
        mock.set_fail_on(failing);

        let err = manager
            .create("partial", Some("numpy"), &CancelToken::new())
            .unwrap_err();

        assert_eq!(err.step(), Some(failing));
        assert!(
            !manager.base_dir().join("partial").exists(),
            "directory survived failure at {failing}"
        );
        assert_eq!(mock.get_steps().last(), Some(&failing));
    }
}

#[test]
fn test_create_error_names_failing_step() {
    let (manager, mock, _temp) = create_manager();
    mock.set_fail_on(Step::InstallKernelSupport);

    let err = manager.create("ml", None, &CancelToken::new()).unwrap_err();

    assert!(err.to_string().starts_with("kernel support installation failed"));
}

#[test]
fn test_create_registers_kernel_with_label() {
    let (manager, mock, _temp) = create_manager();

    let env = manager.create("ds", None, &CancelToken::new()).unwrap();

    let register = mock.invocations_for(Step::RegisterKernel);
    assert_eq!(register.len(), 1);
    assert_eq!(register[0].program, env.interpreter());
    assert_eq!(
        register[0].args_lossy(),
        vec!["-m", "ipykernel", "install", "--user", "--name", "ds", "--display-name", "Python (ds)"]
    );
}

#[test]
fn test_remove_missing_fails_without_calls() {
    let (manager, mock, _temp) = create_manager();

    let err = manager.remove("ghost", &CancelToken::new()).unwrap_err();

    assert!(matches!(err, EnvError::NotFound { .. }));
    assert!(mock.get_invocations().is_empty());
}

#[test]
fn test_remove_deletes_directory_even_if_kernel_step_fails() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();
    mock.set_fail_on(Step::UnregisterKernel);

    let outcome = manager.remove("ml", &CancelToken::new()).unwrap();

    assert!(matches!(outcome, RemoveOutcome::KernelNotRemoved { .. }));
    assert!(!manager.base_dir().join("ml").exists());
    assert!(manager.list().is_empty());
}

#[test]
fn test_remove_unregisters_kernel_by_name() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();
    mock.clear_history();

    let outcome = manager.remove("ml", &CancelToken::new()).unwrap();

    assert_eq!(outcome, RemoveOutcome::Removed);
    let calls = mock.get_invocations();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].args_lossy(),
        vec!["-m", "jupyter", "kernelspec", "uninstall", "ml", "-y"]
    );
}

#[test]
fn test_install_splits_and_trims_tokens() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();
    mock.clear_history();

    let tokens = manager
        .install_packages("ml", " numpy , , pandas ", &CancelToken::new())
        .unwrap();

    assert_eq!(tokens, vec!["numpy", "pandas"]);
    let calls = mock.get_invocations();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].step, Step::InstallPackages);
    assert_eq!(calls[0].args_lossy(), vec!["-m", "pip", "install", "numpy", "pandas"]);
}

#[test]
fn test_install_with_blank_list_is_validation_error() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();
    mock.clear_history();

    for blank in ["", "   ", " , ,, "] {
        let err = manager
            .install_packages("ml", blank, &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(mock.get_invocations().is_empty());
}

#[test]
fn test_install_into_missing_env_is_state_error() {
    let (manager, mock, _temp) = create_manager();

    let err = manager
        .install_packages("nope", "numpy", &CancelToken::new())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::State);
    assert!(mock.get_invocations().is_empty());
}

#[test]
fn test_export_round_trips_freeze_output() {
    let (manager, mock, temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();
    let freeze = "numpy==1.26.4\npandas==2.2.1\n# comment kept\n\n";
    mock.set_stdout(Step::Freeze, freeze);

    let exported = manager.export_requirements("ml", &CancelToken::new()).unwrap();
    assert_eq!(exported, freeze.as_bytes());

    let file = temp.path().join("requirements.txt");
    fs::write(&file, &exported).unwrap();
    assert_eq!(fs::read(&file).unwrap(), freeze.as_bytes());
}

#[test]
fn test_export_keeps_non_utf8_bytes() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();
    let freeze: &[u8] = b"numpy==1.26.4\nlocalpkg @ file:///home/caf\xe9/localpkg\n";
    mock.set_stdout(Step::Freeze, freeze);

    let exported = manager.export_requirements("ml", &CancelToken::new()).unwrap();

    assert_eq!(exported, freeze);
}

#[test]
fn test_export_missing_env_fails() {
    let (manager, _mock, _temp) = create_manager();

    let err = manager.export_requirements("nope", &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_export_propagates_freeze_failure() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();
    mock.set_fail_on(Step::Freeze);

    let err = manager.export_requirements("ml", &CancelToken::new()).unwrap_err();
    assert_eq!(err.step(), Some(Step::Freeze));
    assert!(manager.base_dir().join("ml").exists());
}

#[test]
fn test_package_listing_distinguishes_empty_from_unavailable() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();

    assert_eq!(
        manager.list_installed_packages("ml", &CancelToken::new()),
        PackageListing::Packages(vec![])
    );

    mock.set_stdout(Step::ListPackages, "ipykernel==6.29.0\nnumpy==1.26.4\n");
    assert_eq!(
        manager
            .list_installed_packages("ml", &CancelToken::new())
            .into_lines(),
        vec!["ipykernel==6.29.0", "numpy==1.26.4"]
    );

    mock.set_fail_on(Step::ListPackages);
    assert_eq!(
        manager.list_installed_packages("ml", &CancelToken::new()),
        PackageListing::Unavailable
    );
    assert_eq!(
        manager.list_installed_packages("missing", &CancelToken::new()),
        PackageListing::Unavailable
    );
}

#[test]
fn test_runtime_version_sentinel() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();

    mock.set_stdout(Step::RuntimeVersion, "Python 3.12.2\n");
    assert_eq!(
        manager.runtime_version("ml", &CancelToken::new()),
        RuntimeVersion::Known("Python 3.12.2".into())
    );

    mock.set_fail_on(Step::RuntimeVersion);
    assert_eq!(
        manager.runtime_version("ml", &CancelToken::new()).to_string(),
        "Unknown"
    );
}

#[test]
fn test_describe_reports_path_and_version() {
    let (manager, mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();
    mock.set_stdout(Step::RuntimeVersion, "Python 3.11.9\n");

    let details = manager.describe("ml", &CancelToken::new()).unwrap();

    assert_eq!(details.name.as_str(), "ml");
    assert_eq!(details.root, manager.base_dir().join("ml"));
    assert_eq!(details.version.as_str(), "Python 3.11.9");
}

#[test]
fn test_list_missing_base_dir_is_empty() {
    let temp = tempfile::tempdir().unwrap();
    let manager = EnvManager::new(
        Arc::new(MockRunner::new()),
        ManagerSettings::new(temp.path().join("does").join("not").join("exist")),
    );

    assert!(manager.list().is_empty());
}

#[test]
fn test_managers_with_different_base_dirs_are_independent() {
    let temp = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRunner::new());
    let left = EnvManager::new(mock.clone(), ManagerSettings::new(temp.path().join("left")));
    let right = EnvManager::new(mock, ManagerSettings::new(temp.path().join("right")));

    left.create("shared", None, &CancelToken::new()).unwrap();
    right.create("shared", None, &CancelToken::new()).unwrap();
    left.remove("shared", &CancelToken::new()).unwrap();

    assert!(left.list().is_empty());
    assert_eq!(right.list(), vec!["shared"]);
}

#[cfg(unix)]
#[test]
fn test_activation_command_points_into_env() {
    let (manager, _mock, _temp) = create_manager();
    manager.create("ml", None, &CancelToken::new()).unwrap();

    let command = manager.activation_command("ml").unwrap();
    let expected = manager.base_dir().join("ml").join("bin").join("activate");
    assert_eq!(command, format!("source {}", expected.display()));
}
