use anyhow::{Context, Result};
use async_trait::async_trait;
use lull_core::idle::IdleProbe;
use std::time::Duration;

use super::command::probe_output;

/// X11 idle time via `xprintidle`, which prints milliseconds since last input.
pub struct XprintidleProbe {
    timeout: Duration,
}

impl XprintidleProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl IdleProbe for XprintidleProbe {
    fn name(&self) -> &str {
        "xprintidle"
    }

    async fn probe(&self) -> Result<f64> {
        let out = probe_output("xprintidle", &[], self.timeout).await?;
        parse_millis(&out)
    }
}

fn parse_millis(out: &str) -> Result<f64> {
    let ms: u64 = out
        .trim()
        .parse()
        .with_context(|| format!("unexpected xprintidle output: {:?}", out.trim()))?;
    Ok(ms as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_milliseconds() {
        assert_eq!(parse_millis("61500\n").unwrap(), 61.5);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_millis("couldn't open display").is_err());
    }
}
