use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lull_core::idle::IdleProbe;
use std::path::PathBuf;
use std::time::SystemTime;

/// Seconds since the terminal device was last read from.
///
/// A shell reads its tty on every keystroke, so the access time tracks the
/// user typing. Used as the user-silence signal.
#[derive(Debug, Clone, Default)]
pub struct TtyIdleProbe {
    path: Option<PathBuf>,
}

impl TtyIdleProbe {
    /// Probe the terminal attached to stdin.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Resolve the controlling terminal now; `None` when there is none.
    pub fn detect() -> Option<Self> {
        Self::new().resolve().ok().map(Self::with_path)
    }

    fn resolve(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        if !atty::is(atty::Stream::Stdin) {
            bail!("stdin is not a terminal");
        }
        std::fs::read_link("/proc/self/fd/0")
            .ok()
            .filter(|p| p.starts_with("/dev"))
            .or_else(|| std::env::var_os("SSH_TTY").map(PathBuf::from))
            .context("cannot locate the controlling terminal")
    }
}

#[async_trait]
impl IdleProbe for TtyIdleProbe {
    fn name(&self) -> &str {
        "tty"
    }

    async fn probe(&self) -> Result<f64> {
        let path = self.resolve()?;
        let meta = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        let accessed = meta.accessed()?;
        Ok(SystemTime::now()
            .duration_since(accessed)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::FileTimes;
    use std::time::Duration;

    #[tokio::test]
    async fn reports_time_since_last_access() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let accessed = SystemTime::now() - Duration::from_secs(120);
        file.as_file()
            .set_times(FileTimes::new().set_accessed(accessed))
            .unwrap();

        let secs = TtyIdleProbe::with_path(file.path()).probe().await.unwrap();
        assert!((secs - 120.0).abs() < 5.0, "got {secs}");
    }

    #[tokio::test]
    async fn missing_device_is_an_error() {
        let probe = TtyIdleProbe::with_path("/definitely/not/a/tty");
        assert!(probe.probe().await.is_err());
    }
}
