//
// external.rs
// dcm-bids
//
// Runs external command-line tools, capturing their output and turning non-zero exits into errors.
//
// Thales Matheus Mendonça Santos - November 2025

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Run `program` with `args` to completion and return its captured output.
///
/// Fails with `ToolLaunch` when the binary cannot be started and with
/// `ToolFailed` (carrying stderr) on a non-zero exit status.
pub fn run_tool<I, S>(program: &Path, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_name(program);
    let mut command = Command::new(program);
    command.args(args);
    debug!(command = ?command, "running external tool");

    let output = command.output().map_err(|source| Error::ToolLaunch {
        tool: tool.clone(),
        source,
    })?;

    trace!(
        tool = %tool,
        stdout = %String::from_utf8_lossy(&output.stdout),
        "tool output"
    );

    if !output.status.success() {
        return Err(Error::ToolFailed {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_a_launch_error() {
        let err = run_tool(Path::new("definitely-not-a-real-tool-xyz"), ["--help"]).unwrap_err();
        assert!(matches!(err, Error::ToolLaunch { ref tool, .. } if tool == "definitely-not-a-real-tool-xyz"));
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let err = run_tool(Path::new("sh"), ["-c", "echo broken >&2; exit 3"]).unwrap_err();
        match err {
            Error::ToolFailed { tool, status, stderr } => {
                assert_eq!(tool, "sh");
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn success_returns_stdout() {
        let output = run_tool(Path::new("sh"), ["-c", "echo ok"]).expect("run");
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");
    }
}
