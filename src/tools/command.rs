//! Subprocess execution with a hard deadline.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::ToolError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion, killing it once `timeout` has elapsed.
///
/// Stdin is closed; stdout and stderr are drained on helper threads so a
/// chatty child cannot block on a full pipe.
///
/// # Errors
///
/// - [`ToolError::NotInstalled`] if the program cannot be found
/// - [`ToolError::TimedOut`] if the deadline passes (the child is killed)
/// - [`ToolError::Io`] for any other spawn or wait failure
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<ToolOutput, ToolError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotInstalled(program.clone()),
            _ => ToolError::Io {
                program: program.clone(),
                source: e,
            },
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let started = Instant::now();

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                // Drain threads are left detached: a grandchild may still hold the pipes.
                kill(&mut child, &program);
                return Err(ToolError::TimedOut { program, timeout });
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill(&mut child, &program);
                return Err(ToolError::Io { program, source: e });
            }
        }
    };

    Ok(ToolOutput {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill(child: &mut Child, program: &str) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to kill {}: {}", program, e);
    }
    let _ = child.wait();
}
