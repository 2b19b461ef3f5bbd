use crate::domain::{CancelToken, EnvError, Invocation, Step, ToolOutput, ToolRunner};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs invocations as real child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single invocation that runs longer than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ToolOutput, EnvError> {
        let step = invocation.step;

        if cancel.is_cancelled() {
            return Err(EnvError::Cancelled { step });
        }

        debug!("running {}", invocation.display());

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EnvError::Tool {
                step,
                detail: format!("could not launch {}: {e}", invocation.program.display()),
            })?;

        // Drain both pipes while the child runs; pip can outgrow the pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // The deadline also covers the readers: a background grandchild can
        // keep the pipes open after the child exits. On expiry they are detached.
        let deadline = self.timeout.map(|limit| (Instant::now() + limit, limit));
        let status = wait(&mut child, step, deadline, cancel)?;
        let stdout = collect(stdout, step, deadline, cancel)?;
        let stderr = collect(stderr, step, deadline, cancel)?;
        let output = ToolOutput {
            stdout,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };

        ensure_success(step, status, output)
    }
}

type Deadline = Option<(Instant, Duration)>;

fn drain<R>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut reader| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

fn collect(
    pipe: Option<Receiver<Vec<u8>>>,
    step: Step,
    deadline: Deadline,
    cancel: &CancelToken,
) -> Result<Vec<u8>, EnvError> {
    let Some(rx) = pipe else {
        return Ok(Vec::new());
    };

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(bytes) => return Ok(bytes),
            Err(RecvTimeoutError::Disconnected) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Timeout) => {}
        }

        if cancel.is_cancelled() {
            return Err(EnvError::Cancelled { step });
        }
        if let Some((at, limit)) = deadline {
            if Instant::now() >= at {
                debug!("{} output still open after {:?}, detaching", step, limit);
                return Err(EnvError::TimedOut { step, after: limit });
            }
        }
    }
}

fn wait(
    child: &mut Child,
    step: Step,
    deadline: Deadline,
    cancel: &CancelToken,
) -> Result<ExitStatus, EnvError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                kill(child);
                return Err(EnvError::Tool {
                    step,
                    detail: format!("waiting for process failed: {e}"),
                });
            }
        }

        if cancel.is_cancelled() {
            kill(child);
            return Err(EnvError::Cancelled { step });
        }

        if let Some((at, limit)) = deadline {
            if Instant::now() >= at {
                kill(child);
                return Err(EnvError::TimedOut { step, after: limit });
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn ensure_success(step: Step, status: ExitStatus, output: ToolOutput) -> Result<ToolOutput, EnvError> {
    if status.success() {
        return Ok(output);
    }

    let stderr = output.stderr.trim();
    let detail = if stderr.is_empty() {
        format!("exited with {status}")
    } else {
        stderr.to_string()
    };

    Err(EnvError::Tool { step, detail })
}
