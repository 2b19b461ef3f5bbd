use crate::domain::{CancelToken, EnvError, Invocation, Step, ToolOutput, ToolRunner, interpreter_path};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use std::thread;
use std::time::Duration;

/// Scriptable `ToolRunner` that records every invocation instead of spawning processes.
///
/// A successful `CreateVenv` lays down the environment directory and an empty
/// interpreter file so the rest of the create flow can proceed.
#[derive(Debug, Default)]
pub struct MockRunner {
    invocations: RwLock<Vec<Invocation>>,
    fail_on: RwLock<Option<Step>>,
    stdout: RwLock<HashMap<Step, Vec<u8>>>,
    delay: RwLock<Option<Duration>>,
    skip_interpreter: RwLock<bool>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on(&self, step: Step) {
        *self.fail_on.write().unwrap() = Some(step);
    }

    pub fn clear_fail_on(&self) {
        *self.fail_on.write().unwrap() = None;
    }

    /// Canned standard output returned for every call of `step`.
    pub fn set_stdout(&self, step: Step, stdout: impl AsRef<[u8]>) {
        self.stdout
            .write()
            .unwrap()
            .insert(step, stdout.as_ref().to_vec());
    }

    /// Make every call take at least `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write().unwrap() = Some(delay);
    }

    /// Let `CreateVenv` succeed without writing the interpreter.
    pub fn set_skip_interpreter(&self, skip: bool) {
        *self.skip_interpreter.write().unwrap() = skip;
    }

    pub fn get_invocations(&self) -> Vec<Invocation> {
        self.invocations.read().unwrap().clone()
    }

    pub fn get_steps(&self) -> Vec<Step> {
        self.invocations
            .read()
            .unwrap()
            .iter()
            .map(|inv| inv.step)
            .collect()
    }

    pub fn invocations_for(&self, step: Step) -> Vec<Invocation> {
        self.invocations
            .read()
            .unwrap()
            .iter()
            .filter(|inv| inv.step == step)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.invocations.write().unwrap().clear();
    }

    fn record(&self, invocation: &Invocation) {
        self.invocations.write().unwrap().push(invocation.clone());
    }

    fn fails(&self, step: Step) -> bool {
        *self.fail_on.read().unwrap() == Some(step)
    }

    fn lay_down_venv(&self, invocation: &Invocation) -> Result<(), EnvError> {
        let root = invocation
            .args
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| EnvError::Tool {
                step: Step::CreateVenv,
                detail: "mock: no target path".into(),
            })?;

        fs::create_dir_all(&root).map_err(|e| EnvError::io("mock venv", e))?;

        // Mimic venv failing halfway: the directory exists, the rest does not.
        if self.fails(Step::CreateVenv) {
            return Ok(());
        }

        fs::write(root.join("pyvenv.cfg"), "home = /usr/bin\n")
            .map_err(|e| EnvError::io("mock venv", e))?;

        if !*self.skip_interpreter.read().unwrap() {
            let python = interpreter_path(&root);
            if let Some(parent) = python.parent() {
                fs::create_dir_all(parent).map_err(|e| EnvError::io("mock venv", e))?;
            }
            fs::write(&python, "").map_err(|e| EnvError::io("mock venv", e))?;
        }

        Ok(())
    }
}

impl ToolRunner for MockRunner {
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ToolOutput, EnvError> {
        self.record(invocation);
        let step = invocation.step;

        if let Some(delay) = *self.delay.read().unwrap() {
            thread::sleep(delay);
        }

        if cancel.is_cancelled() {
            return Err(EnvError::Cancelled { step });
        }

        if step == Step::CreateVenv {
            self.lay_down_venv(invocation)?;
        }

        if self.fails(step) {
            return Err(EnvError::Tool {
                step,
                detail: format!("mock failure on {step}"),
            });
        }

        let stdout = self
            .stdout
            .read()
            .unwrap()
            .get(&step)
            .cloned()
            .unwrap_or_default();

        Ok(ToolOutput {
            stdout,
            stderr: String::new(),
        })
    }
}
