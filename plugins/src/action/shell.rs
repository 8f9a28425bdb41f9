use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lull_core::task::{ActionContext, TaskAction, TaskResult};
use lull_core::util::OutputTail;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

const DEFAULT_TAIL_BYTES: usize = 16 * 1024;

/// Runs a command line through the platform shell.
///
/// Exit code 0 is success. The child is killed when the attempt is cancelled
/// or its future dropped. Results carry `exit_code` and `duration_ms` metrics.
#[derive(Debug, Clone)]
pub struct ShellAction {
    command: String,
    cwd: Option<PathBuf>,
    envs: HashMap<String, String>,
    tail_bytes: usize,
}

impl ShellAction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            envs: HashMap::new(),
            tail_bytes: DEFAULT_TAIL_BYTES,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    /// Bytes of stdout/stderr kept for the result.
    pub fn tail_bytes(mut self, bytes: usize) -> Self {
        self.tail_bytes = bytes;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn build_command(&self, ctx: &ActionContext) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.envs)
            .env("LULL_TASK_ID", &ctx.task.id)
            .env("LULL_ATTEMPT", ctx.attempt.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

fn pump<R>(reader: Option<R>, tail: OutputTail) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else { return };
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => tail.push(&buf[..n]),
            }
        }
    })
}

#[async_trait]
impl TaskAction for ShellAction {
    async fn execute(&self, ctx: ActionContext) -> Result<TaskResult> {
        let started = Instant::now();
        let mut child = self
            .build_command(&ctx)
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.command))?;

        let stdout = OutputTail::new(self.tail_bytes);
        let stderr = OutputTail::new(self.tail_bytes);
        let stdout_pump = pump(child.stdout.take(), stdout.clone());
        let stderr_pump = pump(child.stderr.take(), stderr.clone());

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = ctx.cancel.cancelled() => None,
        };
        let Some(status) = waited else {
            let _ = child.kill().await;
            stdout_pump.abort();
            stderr_pump.abort();
            bail!("`{}` cancelled", self.command);
        };
        let status = status.context("failed to wait for child")?;
        let _ = stdout_pump.await;
        let _ = stderr_pump.await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let code = status.code().unwrap_or(-1);
        tracing::debug!(
            task_id = %ctx.task.id,
            exit_code = code,
            duration_ms,
            "shell command finished"
        );

        let result = if status.success() {
            TaskResult::ok(stdout.to_string_lossy())
        } else {
            let stderr = stderr.to_string_lossy();
            let mut result = TaskResult::failure(format!("exit code {code}: {}", stderr.trim()));
            if !stdout.is_empty() {
                result.output = Some(stdout.to_string_lossy());
            }
            result
        };
        Ok(result
            .with_metric("exit_code", code)
            .with_metric("duration_ms", duration_ms))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use lull_core::task::{MetricValue, Priority, Task};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ActionContext {
        ActionContext {
            task: Task::new("shell", Priority::Medium),
            attempt: 0,
            cancel: CancellationToken::new(),
        }
    }

    fn metric(result: &TaskResult, key: &str) -> Option<MetricValue> {
        result.metrics.as_ref()?.get(key).cloned()
    }

    #[tokio::test]
    async fn successful_command_captures_stdout() {
        let result = ShellAction::new("echo hello; echo \"$LULL_TASK_ID\"")
            .execute(ctx())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("hello\nshell\n"));
        assert_eq!(metric(&result, "exit_code"), Some(MetricValue::Number(0.0)));
        assert!(metric(&result, "duration_ms").is_some());
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let result = ShellAction::new("echo partial; echo broken >&2; exit 3")
            .execute(ctx())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("exit code 3: broken"));
        assert_eq!(result.output.as_deref(), Some("partial\n"));
        assert_eq!(metric(&result, "exit_code"), Some(MetricValue::Number(3.0)));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let ctx = ctx();
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let started = Instant::now();
        let err = ShellAction::new("sleep 10").execute(ctx).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellAction::new("echo \"$GREETING\" > out.txt")
            .current_dir(dir.path())
            .env("GREETING", "hi")
            .execute(ctx())
            .await
            .unwrap();
        assert!(result.success);
        let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(written, "hi\n");
    }
}
