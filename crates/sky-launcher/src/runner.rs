//! sky CLI process execution.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::error::SkyError;

/// Output of one CLI invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `program args...`, capturing output. Non-zero exits are errors.
///
/// `timeout_secs == 0` waits for as long as the process runs.
pub async fn run_command(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<CommandOutput, SkyError> {
    let command_line = std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    debug!(command = %command_line, "running sky command");

    let start = Instant::now();
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => SkyError::SkyNotFound(program.to_string()),
            _ => SkyError::Io(e),
        })?;

    let output = if timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| SkyError::Timeout {
                command: command_line.clone(),
                secs: timeout_secs,
            })??
    } else {
        child.wait_with_output().await?
    };

    let result = CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    if !result.success() {
        return Err(SkyError::CommandFailed {
            command: command_line,
            exit_code: result.exit_code,
            stderr: result.stderr.trim().to_string(),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_simple_command() {
        let output = run_command("echo", &["hello".to_string()], 60).await.unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_failing_command() {
        let err = run_command("false", &[], 0).await.unwrap_err();
        assert!(matches!(err, SkyError::CommandFailed { exit_code, .. } if exit_code != 0));
    }

    #[tokio::test]
    async fn test_failure_names_full_command_line() {
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        match run_command("sh", &args, 0).await.unwrap_err() {
            SkyError::CommandFailed {
                command, exit_code, ..
            } => {
                assert_eq!(command, "sh -c exit 3");
                assert_eq!(exit_code, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = run_command("cargoplane-no-such-binary", &[], 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SkyError::SkyNotFound(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = run_command("sleep", &["5".to_string()], 1).await.unwrap_err();
        assert!(matches!(err, SkyError::Timeout { secs: 1, .. }));
    }
}
