use async_trait::async_trait;
use std::sync::Arc;

/// Infallible idle-duration source: always answers, never negative.
#[async_trait]
pub trait IdleSource: Send + Sync {
    async fn idle_seconds(&self) -> f64;
}

/// One environment-specific way of measuring idleness. May fail.
#[async_trait]
pub trait IdleProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn probe(&self) -> anyhow::Result<f64>;
}

/// Tries probes in order; the first finite, non-negative answer wins.
///
/// When every probe fails the chain reports `0.0` (not idle).
#[derive(Clone, Default)]
pub struct ProbeChain {
    probes: Vec<Arc<dyn IdleProbe>>,
}

impl ProbeChain {
    pub fn new(probes: Vec<Arc<dyn IdleProbe>>) -> Self {
        Self { probes }
    }

    pub fn push(mut self, probe: Arc<dyn IdleProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }
}

#[async_trait]
impl IdleSource for ProbeChain {
    async fn idle_seconds(&self) -> f64 {
        for probe in &self.probes {
            match probe.probe().await {
                Ok(secs) if secs.is_finite() && secs >= 0.0 => {
                    tracing::trace!(probe = probe.name(), idle_seconds = secs, "idle probe answered");
                    return secs;
                }
                Ok(secs) => {
                    tracing::debug!(probe = probe.name(), value = secs, "idle probe returned invalid value");
                }
                Err(e) => {
                    tracing::debug!(probe = probe.name(), "idle probe failed: {e:#}");
                }
            }
        }
        0.0
    }
}

/// Source reporting a fixed value; handy for tests and for forcing runs.
#[derive(Debug, Clone, Copy)]
pub struct StaticIdleSource(pub f64);

#[async_trait]
impl IdleSource for StaticIdleSource {
    async fn idle_seconds(&self) -> f64 {
        clamp_idle_seconds(self.0)
    }
}

/// Negative and non-finite readings count as "not idle".
pub fn clamp_idle_seconds(secs: f64) -> f64 {
    if secs.is_finite() {
        secs.max(0.0)
    } else {
        0.0
    }
}
