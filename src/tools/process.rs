//! Running external programs with a timeout and model-safe output.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::util::truncate_with_marker;

/// Bytes of combined output returned to the model.
const MAX_OUTPUT_BYTES: usize = 10_000;

/// Captured result of a finished program.
#[derive(Debug)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Render as tool output text, truncated for the conversation.
    pub fn render(&self) -> String {
        let mut result = format!("Exit code: {}\n", self.exit_code);
        if !self.stdout.is_empty() {
            result.push_str("\n--- stdout ---\n");
            result.push_str(&self.stdout);
        }
        if !self.stderr.is_empty() {
            result.push_str("\n--- stderr ---\n");
            result.push_str(&self.stderr);
        }
        truncate_with_marker(&result, MAX_OUTPUT_BYTES, "\n... [output truncated]")
    }
}

/// Strip binary garbage while keeping valid text.
pub fn sanitize_output(bytes: &[u8]) -> String {
    let non_printable = bytes
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();

    // More than 10% control bytes: almost certainly binary.
    if bytes.len() > 100 && non_printable > bytes.len() / 10 {
        return format!(
            "[Binary output detected - {} bytes, {}% non-printable]",
            bytes.len(),
            non_printable * 100 / bytes.len()
        );
    }

    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c == '\n' || c == '\r' || c == '\t' || (c >= ' ' && c != '\u{FFFD}'))
        .collect()
}

/// Run `program args..` in `cwd`, killing it after `timeout`.
pub async fn run_program(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> anyhow::Result<ProcessOutput> {
    tracing::info!("Running {} {:?} in {:?}", program, args, cwd);

    let child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::warn!("Failed to start {}: {}", program, e);
            anyhow::bail!("Failed to execute {}: {}", program, e);
        }
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", program, timeout);
            anyhow::bail!("{} timed out after {} seconds", program, timeout.as_secs());
        }
    };

    let result = ProcessOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: sanitize_output(&output.stdout),
        stderr: sanitize_output(&output.stderr),
    };
    tracing::debug!(
        "{} finished: exit={}, stdout_len={}, stderr_len={}",
        program,
        result.exit_code,
        result.stdout.len(),
        result.stderr.len()
    );
    Ok(result)
}
