//! Interpreter strategy selection and script process execution.
//!
//! A decoded script body is written to a uniquely-named file in the
//! per-organization scripts directory and run as a child process. Stdout and
//! stderr are captured into separate buffers; a non-zero exit code is not a
//! pipeline failure and is reported through the captured stderr text.

use crate::error::AgentError;
use crate::interpreter::{ExecutionResult, InterpreterOverride};
use crate::shutdown;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Byte-order mark written ahead of PowerShell-family scripts so the
/// interpreter does not misdetect the file encoding.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Environment variable exposing the running agent's version to child
/// scripts.
pub const VERSION_ENV_VAR: &str = "REWST_AGENT_VERSION";

/// Local shell family used to run a decoded script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    PowerShell,
    /// PowerShell Core, used where Windows PowerShell is unavailable.
    Pwsh,
}

impl Shell {
    pub fn program(self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::PowerShell => "powershell",
            Shell::Pwsh => "pwsh",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Shell::Bash => "sh",
            Shell::PowerShell | Shell::Pwsh => "ps1",
        }
    }

    pub fn is_powershell_family(self) -> bool {
        matches!(self, Shell::PowerShell | Shell::Pwsh)
    }

    fn command(self, script: &Path) -> Command {
        let mut cmd = Command::new(self.program());
        match self {
            Shell::Bash => {
                cmd.arg(script);
            }
            Shell::PowerShell | Shell::Pwsh => {
                cmd.arg("-File").arg(script);
            }
        }
        cmd
    }
}

/// Resolve the execution strategy once, from the parsed override and the
/// target platform.
pub fn resolve(interpreter: InterpreterOverride, windows: bool) -> Shell {
    match interpreter {
        InterpreterOverride::Bash => Shell::Bash,
        InterpreterOverride::Pwsh => Shell::Pwsh,
        InterpreterOverride::PowerShell => {
            if windows {
                Shell::PowerShell
            } else {
                Shell::Pwsh
            }
        }
        InterpreterOverride::Unset => {
            if windows {
                Shell::PowerShell
            } else {
                Shell::Bash
            }
        }
    }
}

/// Run a script body through the given shell.
///
/// The script file is removed once the process has started and its output is
/// captured; if the process cannot be started the file stays behind as
/// diagnostic evidence.
pub async fn run_script(
    shell: Shell,
    script_body: &str,
    scripts_dir: &Path,
    post_id: &str,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<ExecutionResult, AgentError> {
    tokio::fs::create_dir_all(scripts_dir)
        .await
        .map_err(|e| AgentError::Execution(format!("failed to create scripts directory: {e}")))?;

    let script_path = scripts_dir.join(format!("exec-{}.{}", Uuid::new_v4(), shell.extension()));
    write_script(&script_path, shell, script_body).await?;
    info!(post_id, path = %script_path.display(), "command saved");

    let mut cmd = shell.command(&script_path);
    cmd.env(VERSION_ENV_VAR, env!("CARGO_PKG_VERSION"));
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        AgentError::Execution(format!("failed to start {}: {e}", shell.program()))
    })?;

    let output = tokio::select! {
        output = child.wait_with_output() => {
            output.map_err(|e| AgentError::Execution(format!("failed to await process: {e}")))?
        }
        _ = shutdown::cancelled(&mut shutdown_rx) => {
            // Dropping the child kills it; the script file stays behind.
            return Err(AgentError::Cancelled);
        }
    };

    // Output captured; the script file has served its purpose.
    if let Err(e) = tokio::fs::remove_file(&script_path).await {
        warn!(path = %script_path.display(), error = %e, "failed to remove script file");
    }

    let result = ExecutionResult {
        error: String::from_utf8_lossy(&output.stderr).into_owned(),
        output: String::from_utf8_lossy(&output.stdout).into_owned(),
    };

    info!(post_id, exit_code = ?output.status.code(), "command completed");
    debug!(error = %result.error, output = %result.output, "command outputs");
    Ok(result)
}

async fn write_script(path: &Path, shell: Shell, body: &str) -> Result<(), AgentError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| AgentError::Execution(format!("failed to create script file: {e}")))?;

    if shell.is_powershell_family() {
        file.write_all(UTF8_BOM)
            .await
            .map_err(|e| AgentError::Execution(format!("failed to write script file: {e}")))?;
    }

    file.write_all(body.as_bytes())
        .await
        .map_err(|e| AgentError::Execution(format!("failed to write script file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| AgentError::Execution(format!("failed to write script file: {e}")))?;

    Ok(())
}
