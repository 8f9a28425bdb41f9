use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use lull_core::idle::IdleProbe;
use std::time::Duration;

use super::command::probe_output;

/// macOS HID idle time from `ioreg -c IOHIDSystem` (`HIDIdleTime`, nanoseconds).
pub struct IoregProbe {
    timeout: Duration,
}

impl IoregProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl IdleProbe for IoregProbe {
    fn name(&self) -> &str {
        "ioreg"
    }

    async fn probe(&self) -> Result<f64> {
        if !cfg!(target_os = "macos") {
            bail!("ioreg is only available on macOS");
        }
        let out = probe_output("ioreg", &["-c", "IOHIDSystem"], self.timeout).await?;
        parse_hid_idle_time(&out)
    }
}

fn parse_hid_idle_time(out: &str) -> Result<f64> {
    let line = out
        .lines()
        .find(|l| l.contains("\"HIDIdleTime\""))
        .ok_or_else(|| anyhow!("HIDIdleTime not found in ioreg output"))?;
    let value = line
        .rsplit('=')
        .next()
        .map(str::trim)
        .unwrap_or_default();
    let ns: u64 = value
        .parse()
        .map_err(|e| anyhow!("bad HIDIdleTime value {value:?}: {e}"))?;
    Ok(ns as f64 / 1_000_000_000.0)
}
