use crate::{
    error::{ExporterError, Result},
    runner::{build_command, StdinWriter},
    script::ScriptSpec,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

/// Runs the one-off startup command, streaming its output into the log.
///
/// The startup command is not bound by the configured timeout. A non-zero exit
/// is returned as [`ExporterError::StartupFailed`] and is expected to abort
/// the process before serving begins.
pub async fn run_startup(spec: &ScriptSpec) -> Result<()> {
    info!("running startup command: {}", spec.command().description());

    let mut child = build_command(spec)
        .and_then(|mut command| command.spawn())
        .map_err(|source| ExporterError::SpawnFailed {
            name: spec.name().to_string(),
            source,
        })?;

    let _writer = spec
        .command()
        .stdin_body()
        .map(|body| StdinWriter::spawn(child.stdin.take(), body, spec.name()));

    // Not awaited: daemons started by the script may hold the pipes open.
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, spec.name().to_string()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, spec.name().to_string()));
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(ExporterError::StartupFailed(format!(
            "'{}' {}",
            spec.command().description(),
            status
        )));
    }

    info!("startup command finished");
    Ok(())
}

async fn forward_lines<R: AsyncRead + Unpin>(stream: R, name: String) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!("{}: {}", name, line),
            Ok(None) => return,
            Err(e) => {
                warn!("{} stdout/stderr read: {}", name, e);
                return;
            }
        }
    }
}
