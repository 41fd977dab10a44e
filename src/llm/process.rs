use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{CompletionRequest, LlmBackend};
use crate::error::LlmError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Drives an external model runner: `<runner> run <model>`, prompt on stdin,
/// completion on stdout. Stop sequences are left to the runner.
pub struct ProcessBackend {
    runner: String,
    model: String,
    command_line: String,
    strict_exit: bool,
    timeout: Option<Duration>,
}

impl ProcessBackend {
    pub fn new(runner: &str, model: &str) -> Self {
        Self {
            runner: runner.to_string(),
            model: model.to_string(),
            command_line: format!("{runner} run {model}"),
            strict_exit: true,
            timeout: None,
        }
    }

    /// When false, a failing runner's stdout is returned as if it had succeeded.
    pub fn strict_exit(mut self, strict: bool) -> Self {
        self.strict_exit = strict;
        self
    }

    pub fn timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.timeout = secs.map(Duration::from_secs);
        self
    }

    fn spawn(&self) -> Result<Child, LlmError> {
        Command::new(&self.runner)
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LlmError::ProcessLaunch {
                command: self.command_line.clone(),
                source,
            })
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, LlmError> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                warn!(command = %self.command_line, "model runner timed out, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(LlmError::Timeout {
                    command: self.command_line.clone(),
                    secs: timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl LlmBackend for ProcessBackend {
    fn complete(&self, prompt: &str, _request: &CompletionRequest) -> Result<String, LlmError> {
        info!(command = %self.command_line, "running model runner");
        let mut child = self.spawn()?;

        // stdin is fed and stdout/stderr drained on their own threads so a
        // prompt larger than the pipe buffer cannot wedge the runner.
        let mut stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let payload = prompt.as_bytes().to_vec();
        let writer = thread::spawn(move || stdin.write_all(&payload));
        let stdout = drain(child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?);
        let stderr = drain(child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?);

        let status = self.wait(&mut child)?;

        match join(writer)? {
            Ok(()) => {}
            // The runner is free to exit without reading everything.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("model runner closed stdin early");
            }
            Err(e) => return Err(e.into()),
        }
        let stdout = join(stdout)??;
        let stderr = join(stderr)??;

        debug!(%status, stdout_bytes = stdout.len(), "model runner finished");
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            if self.strict_exit {
                return Err(LlmError::ProcessFailed {
                    command: self.command_line.clone(),
                    status: status.to_string(),
                    stderr,
                });
            }
            warn!(%status, %stderr, "model runner failed; using its output anyway");
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn name(&self) -> &str {
        &self.command_line
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join<T>(handle: JoinHandle<T>) -> Result<T, LlmError> {
    handle
        .join()
        .map_err(|_| LlmError::Inference("model runner I/O thread panicked".to_string()))
}

fn missing_pipe(which: &str) -> LlmError {
    LlmError::Inference(format!("model runner {which} was not captured"))
}
