//! Bounded external process calls used by the probers.

use std::ffi::OsStr;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Captured output of a finished child.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            let _ = r.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// How long a killed child's pipe readers get to reach EOF
const DRAIN_GRACE: Duration = Duration::from_millis(500);

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Join the pipe readers after a kill, giving up after `DRAIN_GRACE`.
///
/// A reader only stays blocked when a grandchild of the killed tool still
/// holds the pipe; that thread is detached and ends when the grandchild exits.
fn join_drains(handles: [thread::JoinHandle<String>; 2]) {
    let deadline = Instant::now() + DRAIN_GRACE;
    for handle in handles {
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            debug!("pipe reader still blocked after kill, detaching");
        }
    }
}

/// Run `program args...` and wait at most `timeout` for it to exit.
///
/// The child is killed on expiry. A non-zero exit status is reported as
/// `ProcessError::Failed` with the captured stderr.
pub fn run_with_timeout<I, S>(
    program: &str,
    args: I,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let poll = Duration::from_millis(20);
    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() >= timeout {
                    kill_quietly(&mut child);
                    join_drains([stdout, stderr]);
                    return Err(ProcessError::Timeout {
                        program: program.to_string(),
                        timeout,
                    });
                }
                thread::sleep(poll);
            }
            Err(source) => {
                kill_quietly(&mut child);
                join_drains([stdout, stderr]);
                return Err(ProcessError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        return Err(ProcessError::Failed {
            program: program.to_string(),
            code: status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(ProcessOutput { stdout, stderr })
}
