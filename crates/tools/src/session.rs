//! Persistent command session: one long-lived shell process.
//!
//! Commands are written to the shell's stdin followed by an `echo` of a
//! sentinel. Background tasks drain stdout and stderr into shared buffers;
//! a command is complete once the sentinel shows up in stdout. A command
//! that does not complete within the timeout leaves the session in a
//! sticky timed-out state until it is replaced.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use taskloom_core::error::SessionError;
use taskloom_core::tool::ToolResult;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Marker echoed after every command to detect completion.
pub const SENTINEL: &str = "<<exit>>";

type Buffer = Arc<Mutex<Vec<u8>>>;

/// Settings for a [`CommandSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub shell: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub working_dir: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            shell: "/bin/bash".into(),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(200),
            working_dir: None,
        }
    }
}

impl From<&taskloom_config::SessionConfig> for SessionOptions {
    fn from(config: &taskloom_config::SessionConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            working_dir: None,
        }
    }
}

/// A running shell process plus its output buffers.
struct Process {
    child: Child,
    stdin: ChildStdin,
    stdout: Buffer,
    stderr: Buffer,
    readers: [JoinHandle<()>; 2],
}

pub struct CommandSession {
    options: SessionOptions,
    process: Option<Process>,
    timed_out: bool,
}

impl CommandSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            process: None,
            timed_out: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.process.is_some()
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Spawn the shell. Calling this on a started session does nothing.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.process.is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.options.shell);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.options.working_dir {
            cmd.current_dir(dir);
        }
        // Own process group, so stop() reaches everything the shell spawned.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| SessionError::Io(format!("failed to spawn {}: {e}", self.options.shell)))?;

        let (Some(stdin), Some(out), Some(err)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.start_kill();
            return Err(SessionError::Io("shell pipes unavailable".into()));
        };

        let stdout: Buffer = Arc::default();
        let stderr: Buffer = Arc::default();
        let readers = [
            tokio::spawn(drain(out, stdout.clone())),
            tokio::spawn(drain(err, stderr.clone())),
        ];

        debug!(shell = %self.options.shell, pid = child.id(), "Command session started");
        self.process = Some(Process {
            child,
            stdin,
            stdout,
            stderr,
            readers,
        });
        Ok(())
    }

    /// Run one command and wait for its sentinel.
    ///
    /// Returns the stdout text before the sentinel (minus one trailing
    /// newline) as `output` and everything written to stderr as `error`.
    /// Both buffers are cleared afterwards.
    pub async fn run(&mut self, command: &str) -> Result<ToolResult, SessionError> {
        let timeout = self.options.timeout;
        let poll_interval = self.options.poll_interval;

        let Some(process) = self.process.as_mut() else {
            return Err(SessionError::NotStarted);
        };
        if let Some(code) = exit_code(&mut process.child)? {
            return Err(SessionError::Exited { code });
        }
        if self.timed_out {
            return Err(SessionError::TimedOut {
                timeout_secs: timeout.as_secs_f64(),
            });
        }

        let line = format!("{command}; echo '{SENTINEL}'\n");
        process
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SessionError::Io(e.to_string()))?;
        process
            .stdin
            .flush()
            .await
            .map_err(|e| SessionError::Io(e.to_string()))?;

        let waited = tokio::time::timeout(timeout, wait_for_sentinel(process, poll_interval)).await;
        let output = match waited {
            Ok(result) => result?,
            Err(_) => {
                warn!(command, timeout_secs = timeout.as_secs(), "Command session timed out");
                self.timed_out = true;
                return Err(SessionError::TimedOut {
                    timeout_secs: timeout.as_secs_f64(),
                });
            }
        };

        // stderr is drained separately and may still be catching up.
        tokio::time::sleep(poll_interval).await;
        let error = take_text(&process.stderr);
        Ok(ToolResult {
            output: Some(strip_one_newline(output)),
            error: Some(strip_one_newline(error)).filter(|e| !e.is_empty()),
            ..Default::default()
        })
    }

    /// Terminate the shell and its process group. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        if matches!(process.child.try_wait(), Ok(None)) {
            terminate(&mut process.child);
        }
        for reader in &process.readers {
            reader.abort();
        }
        debug!("Command session stopped");
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R, buffer: Buffer) {
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(&chunk[..n]),
        }
    }
}

/// Poll stdout until the sentinel appears, returning the text before it.
async fn wait_for_sentinel(
    process: &mut Process,
    poll_interval: Duration,
) -> Result<String, SessionError> {
    let sentinel = SENTINEL.as_bytes();
    loop {
        tokio::time::sleep(poll_interval).await;
        {
            let mut buf = process.stdout.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(pos) = buf.windows(sentinel.len()).position(|w| w == sentinel) {
                let text = String::from_utf8_lossy(&buf[..pos]).into_owned();
                buf.clear();
                return Ok(text);
            }
        }
        if let Some(code) = exit_code(&mut process.child)? {
            return Err(SessionError::Exited { code });
        }
    }
}

fn exit_code(child: &mut Child) -> Result<Option<i32>, SessionError> {
    child
        .try_wait()
        .map(|status| status.map(|s| s.code().unwrap_or(-1)))
        .map_err(|e| SessionError::Io(e.to_string()))
}

fn take_text(buffer: &Buffer) -> String {
    let mut buf = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    let text = String::from_utf8_lossy(&buf).into_owned();
    buf.clear();
    text
}

fn strip_one_newline(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
    }
    text
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    match child.id() {
        // SAFETY: killpg only sends a signal; the group id is our child's pid.
        Some(pid) => unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGTERM);
        },
        None => {
            let _ = child.start_kill();
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn fast_options() -> SessionOptions {
        SessionOptions {
            poll_interval: Duration::from_millis(20),
            timeout: Duration::from_secs(10),
            ..SessionOptions::default()
        }
    }

    async fn started(options: SessionOptions) -> CommandSession {
        let mut session = CommandSession::new(options);
        session.start().await.unwrap();
        session
    }

    #[tokio::test]
    async fn run_before_start_is_rejected() {
        let mut session = CommandSession::new(fast_options());
        assert_eq!(
            session.run("echo hi").await.unwrap_err(),
            SessionError::NotStarted
        );
    }

    #[tokio::test]
    async fn runs_command_and_strips_sentinel() {
        let mut session = started(fast_options()).await;
        let result = session.run("echo hello").await.unwrap();
        assert_eq!(result.output.as_deref(), Some("hello"));
        assert!(result.error.is_none());
        session.stop();
    }

    #[tokio::test]
    async fn state_persists_between_commands() {
        let mut session = started(fast_options()).await;
        session.run("export GREETING=persisted").await.unwrap();
        let result = session.run("echo $GREETING").await.unwrap();
        assert_eq!(result.output.as_deref(), Some("persisted"));
        session.stop();
    }

    #[tokio::test]
    async fn stderr_is_reported_and_cleared() {
        let mut session = started(fast_options()).await;
        let result = session.run("echo oops >&2").await.unwrap();
        assert_eq!(result.error.as_deref(), Some("oops"));
        assert_eq!(result.output.as_deref(), Some(""));

        // Give the stderr reader nothing new; the next run must not replay it.
        let next = session.run("echo clean").await.unwrap();
        assert_eq!(next.output.as_deref(), Some("clean"));
        assert!(next.error.is_none());
        session.stop();
    }

    #[tokio::test]
    async fn stderr_stays_with_the_command_that_wrote_it() {
        let mut session = started(fast_options()).await;
        for i in 0..5 {
            let result = session
                .run(&format!("echo err{i} >&2; echo out{i}"))
                .await
                .unwrap();
            assert_eq!(result.output, Some(format!("out{i}")));
            assert_eq!(result.error, Some(format!("err{i}")));
        }
        session.stop();
    }

    #[tokio::test]
    async fn timeout_is_sticky_until_replaced() {
        let mut session = started(SessionOptions {
            timeout: Duration::from_millis(300),
            ..fast_options()
        })
        .await;

        let err = session.run("sleep 5").await.unwrap_err();
        assert!(matches!(err, SessionError::TimedOut { .. }));
        assert!(session.is_timed_out());

        let again = session.run("echo hi").await.unwrap_err();
        assert!(matches!(again, SessionError::TimedOut { .. }));
        session.stop();

        // A replacement session does not see the old buffers.
        let mut fresh = started(fast_options()).await;
        let result = fresh.run("echo fresh").await.unwrap();
        assert_eq!(result.output.as_deref(), Some("fresh"));
        fresh.stop();
    }

    #[tokio::test]
    async fn exited_shell_reports_code() {
        let mut session = started(fast_options()).await;
        let err = session.run("exit 3").await.unwrap_err();
        assert_eq!(err, SessionError::Exited { code: 3 });

        let again = session.run("echo hi").await.unwrap_err();
        assert_eq!(again, SessionError::Exited { code: 3 });
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let mut session = started(fast_options()).await;
        session.start().await.unwrap();
        assert!(session.is_started());
        session.stop();
        session.stop();
        assert!(!session.is_started());
    }

    #[tokio::test]
    async fn working_dir_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = started(SessionOptions {
            working_dir: Some(dir.path().to_path_buf()),
            ..fast_options()
        })
        .await;
        let result = session.run("pwd").await.unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let got = std::path::PathBuf::from(result.output.unwrap())
            .canonicalize()
            .unwrap();
        assert_eq!(got, expected);
        session.stop();
    }
}
