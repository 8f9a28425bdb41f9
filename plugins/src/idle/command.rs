use anyhow::{bail, Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run a probe command and return its stdout. The child is killed if the
/// deadline passes.
pub(crate) async fn probe_output(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .with_context(|| format!("{program} timed out after {timeout:?}"))?
        .with_context(|| format!("failed to run {program}"))?;

    if !output.status.success() {
        bail!("{program} exited with {}", output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let out = probe_output("sh", &["-c", "echo 1234"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "1234");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let err = probe_output("sh", &["-c", "exit 2"], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited"));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = probe_output("sh", &["-c", "sleep 5"], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        assert!(
            probe_output("lull-no-such-probe", &[], Duration::from_secs(1))
                .await
                .is_err()
        );
    }
}
