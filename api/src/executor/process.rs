/// Bounded execution of external tools.
///
/// Each call spawns a fresh child with piped stdout/stderr and waits for it
/// under a deadline. On expiry the child is killed (via `kill_on_drop`)
/// and the caller gets `ToolError::Timeout`.
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ToolError;

/// Lines of stderr kept in error values and logs.
const STDERR_TAIL_LINES: usize = 8;

/// Last few non-empty lines of a tool's stderr.
pub fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run `program args...` and return its output if it exits successfully.
pub async fn run_tool(
    program: &str,
    args: &[String],
    limit: Duration,
) -> Result<Output, ToolError> {
    debug!("Running {} with {} args", program, args.len());

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolError::SpawnFailed {
            tool: program.to_string(),
            reason: e.to_string(),
        })?;

    let pid = child.id();
    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("{} (pid {:?}) exceeded {}s, killing", program, pid, limit.as_secs());
            return Err(ToolError::Timeout {
                tool: program.to_string(),
                secs: limit.as_secs(),
            });
        }
    };

    if !output.status.success() {
        let tail = stderr_tail(&output.stderr);
        for line in tail.lines() {
            debug!(target: "external_tool", "{}: {}", program, line);
        }
        return Err(ToolError::Failed {
            tool: program.to_string(),
            code: output.status.code(),
            stderr: tail,
        });
    }

    Ok(output)
}
