use crate::{
    outcome::{ExecutionOutcome, Termination},
    script::ScriptSpec,
};
use async_trait::async_trait;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, warn};

/// Executes one script and classifies how it ended.
///
/// Implementations never fail: every problem is folded into the returned
/// [`ExecutionOutcome`] so one script can't take down a gather cycle.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, spec: &ScriptSpec) -> ExecutionOutcome;
}

/// Runs scripts as OS processes bounded by their configured timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, spec: &ScriptSpec) -> ExecutionOutcome {
        let start = Instant::now();
        let (termination, stdout, stderr) = execute(spec).await;

        let outcome = ExecutionOutcome {
            script: spec.name().to_string(),
            termination,
            stdout,
            stderr,
            duration: start.elapsed(),
        };
        log_outcome(spec, &outcome);
        outcome
    }
}

async fn execute(spec: &ScriptSpec) -> (Termination, Vec<u8>, Vec<u8>) {
    let mut child = match build_command(spec).and_then(|mut command| command.spawn()) {
        Ok(child) => child,
        Err(e) => return (Termination::NotStarted(e.to_string()), Vec::new(), Vec::new()),
    };

    let _writer = spec
        .command()
        .stdin_body()
        .map(|body| StdinWriter::spawn(child.stdin.take(), body, spec.name()));
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let collected = timeout(spec.timeout(), collect(&mut child, stdout, stderr)).await;

    match collected {
        Ok(Ok((status, stdout, stderr))) => match status.code() {
            Some(0) => (Termination::Exited(0), stdout, Vec::new()),
            Some(code) => (Termination::Exited(code), stdout, stderr),
            None => (
                Termination::Failed(format!("terminated abnormally ({})", status)),
                Vec::new(),
                stderr,
            ),
        },
        Ok(Err(e)) => {
            terminate(&mut child, spec.name()).await;
            (Termination::Failed(e.to_string()), Vec::new(), Vec::new())
        }
        Err(_) => {
            terminate(&mut child, spec.name()).await;
            (Termination::TimedOut, Vec::new(), Vec::new())
        }
    }
}

/// Builds the OS command for a script: stdout/stderr piped, stdin piped
/// only when a shell body has to be fed in.
pub(crate) fn build_command(spec: &ScriptSpec) -> io::Result<tokio::process::Command> {
    let (program, args) = spec
        .command()
        .program_args()
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

    let mut command = std::process::Command::new(program);
    command.args(args);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own group, so a timeout also reaches whatever the script forked.
        command.process_group(0);
    }

    let stdin = if spec.command().stdin_body().is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    let mut command = tokio::process::Command::from(command);
    command
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    Ok(command)
}

/// Feeds a shell body to the child's stdin on its own task. The pipe is
/// closed when the write finishes or when the guard is dropped, whichever
/// comes first.
pub(crate) struct StdinWriter(JoinHandle<()>);

impl StdinWriter {
    pub(crate) fn spawn(stdin: Option<ChildStdin>, body: &str, name: &str) -> Self {
        let body = body.to_string();
        let name = name.to_string();

        Self(tokio::spawn(async move {
            let Some(mut stdin) = stdin else {
                return;
            };
            if let Err(e) = stdin.write_all(body.as_bytes()).await {
                debug!("Writing script body to '{}' failed: {}", name, e);
            }
        }))
    }
}

impl Drop for StdinWriter {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn collect(
    child: &mut Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let (status, stdout, stderr) =
        tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr));
    Ok((status?, stdout?, stderr?))
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buffer).await?;
    }
    Ok(buffer)
}

async fn terminate(child: &mut Child, name: &str) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!("Failed to signal process group of '{}': {}", name, e);
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!("Failed to kill '{}': {}", name, e);
    }
}

fn log_outcome(spec: &ScriptSpec, outcome: &ExecutionOutcome) {
    match &outcome.termination {
        Termination::Exited(0) => {
            debug!(
                "command '{}' succeeded in {:?}",
                outcome.script, outcome.duration
            );
        }
        Termination::Exited(code) => {
            warn!("command '{}' exited {}", outcome.script, code);
            if let Some(stderr) = outcome.stderr_text() {
                warn!("command '{}' stderr:\n{}", outcome.script, stderr);
            }
        }
        Termination::TimedOut => {
            warn!(
                "command '{}' timed out after {:?}",
                outcome.script,
                spec.timeout()
            );
        }
        Termination::Failed(reason) => {
            warn!("command '{}' failed: {}", outcome.script, reason);
        }
        Termination::NotStarted(reason) => {
            error!(
                "command '{}' could not be started ({}): {}",
                outcome.script,
                spec.command().description(),
                reason
            );
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::script::Command;
    use std::time::Duration;

    fn spec(name: &str, command: Command, timeout: Duration) -> ScriptSpec {
        ScriptSpec::builder()
            .name(name)
            .command(command)
            .timeout(timeout)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_argv_command_success() {
        let spec = spec(
            "echo",
            Command::argv(["/bin/echo", "foo 1"]),
            Duration::from_secs(5),
        );

        let outcome = ProcessRunner::new().run(&spec).await;

        assert_eq!(outcome.termination, Termination::Exited(0));
        assert_eq!(outcome.stdout, b"foo 1\n");
        assert!(outcome.stderr.is_empty());
        assert_eq!(outcome.script, "echo");
    }

    #[tokio::test]
    async fn test_shell_body_is_piped_to_interpreter() {
        let spec = spec(
            "shell",
            Command::shell("echo 'foo{a=\"b\"} 2'\necho bar 3\n"),
            Duration::from_secs(5),
        );

        let outcome = ProcessRunner::new().run(&spec).await;

        assert!(outcome.succeeded());
        assert_eq!(
            String::from_utf8_lossy(&outcome.stdout),
            "foo{a=\"b\"} 2\nbar 3\n"
        );
    }

    #[tokio::test]
    async fn test_shell_body_fails_fast() {
        let spec = spec(
            "failfast",
            Command::shell("false\necho never\n"),
            Duration::from_secs(5),
        );

        let outcome = ProcessRunner::new().run(&spec).await;

        assert_eq!(outcome.exit_code(), Some(1));
        assert!(outcome.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_keeps_stderr() {
        let spec = spec(
            "broken",
            Command::shell("echo partial 1\necho boom >&2\nexit 3\n"),
            Duration::from_secs(5),
        );

        let outcome = ProcessRunner::new().run(&spec).await;

        assert_eq!(outcome.termination, Termination::Exited(3));
        assert_eq!(outcome.stderr_text().as_deref(), Some("boom"));
        assert_eq!(outcome.parseable_output(), Some(&b"partial 1\n"[..]));
    }

    #[tokio::test]
    async fn test_timeout_kills_process_and_discards_output() {
        let timeout = Duration::from_millis(300);
        let spec = spec(
            "slow",
            Command::shell("echo early 1\nsleep 30\n"),
            timeout,
        );

        let start = std::time::Instant::now();
        let outcome = ProcessRunner::new().run(&spec).await;

        assert!(outcome.timed_out());
        assert_eq!(outcome.exit_code(), Some(-1));
        assert!(outcome.stdout.is_empty());
        assert!(outcome.parseable_output().is_none());
        assert!(outcome.duration >= timeout);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_binary_is_start_failure() {
        let spec = spec(
            "missing",
            Command::argv(["/nonexistent/command-exporter-test"]),
            Duration::from_secs(5),
        );

        let outcome = ProcessRunner::new().run(&spec).await;

        assert_eq!(outcome.exit_code(), None);
        assert!(outcome.start_error().is_some());
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_interpreter_ignoring_stdin_does_not_deadlock() {
        let body = "x".repeat(4 * 1024 * 1024);
        let spec = spec(
            "ignores-stdin",
            Command::shell_with(vec!["/bin/echo".into(), "done 1".into()], body),
            Duration::from_secs(5),
        );

        let outcome = ProcessRunner::new().run(&spec).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.stdout, b"done 1\n");
    }
}
