use anyhow::{bail, Result};
use async_trait::async_trait;
use lull_core::idle::IdleProbe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

type LoadSampler = Arc<dyn Fn() -> Result<f64> + Send + Sync>;

/// Headless fallback: treats a quiet CPU as an idle machine.
///
/// Reports the seconds since the per-core one-minute load was last above
/// `threshold`. Probe creation counts as the last busy moment.
pub struct LoadAverageProbe {
    threshold: f64,
    sampler: LoadSampler,
    last_busy: Mutex<Instant>,
}

impl LoadAverageProbe {
    pub fn new(threshold: f64) -> Self {
        Self::with_sampler(threshold, Arc::new(system_load_per_core))
    }

    pub fn with_sampler(threshold: f64, sampler: LoadSampler) -> Self {
        Self {
            threshold,
            sampler,
            last_busy: Mutex::new(Instant::now()),
        }
    }
}

#[async_trait]
impl IdleProbe for LoadAverageProbe {
    fn name(&self) -> &str {
        "loadavg"
    }

    async fn probe(&self) -> Result<f64> {
        let load = (self.sampler)()?;
        let mut last_busy = self.last_busy.lock().unwrap_or_else(|e| e.into_inner());
        if load > self.threshold {
            tracing::trace!(load, threshold = self.threshold, "machine busy");
            *last_busy = Instant::now();
            return Ok(0.0);
        }
        Ok(last_busy.elapsed().as_secs_f64())
    }
}

fn system_load_per_core() -> Result<f64> {
    if cfg!(windows) {
        bail!("load average is not available on Windows");
    }
    let load = sysinfo::System::load_average();
    Ok(load.one / num_cpus::get().max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn probe_with(load: Arc<AtomicU64>) -> LoadAverageProbe {
        LoadAverageProbe::with_sampler(
            0.5,
            Arc::new(move || Ok(f64::from_bits(load.load(Ordering::SeqCst)))),
        )
    }

    #[tokio::test]
    async fn busy_machine_is_not_idle() {
        let load = Arc::new(AtomicU64::new(2.0f64.to_bits()));
        let probe = probe_with(load);
        assert_eq!(probe.probe().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn quiet_machine_accumulates_idle_time() {
        let load = Arc::new(AtomicU64::new(0.1f64.to_bits()));
        let probe = probe_with(load.clone());

        *probe.last_busy.lock().unwrap() = Instant::now() - std::time::Duration::from_secs(30);
        let secs = probe.probe().await.unwrap();
        assert!(secs >= 30.0 && secs < 40.0, "got {secs}");

        load.store(0.9f64.to_bits(), Ordering::SeqCst);
        assert_eq!(probe.probe().await.unwrap(), 0.0);

        load.store(0.1f64.to_bits(), Ordering::SeqCst);
        assert!(probe.probe().await.unwrap() < 5.0);
    }

    #[tokio::test]
    async fn sampler_errors_propagate() {
        let probe = LoadAverageProbe::with_sampler(0.5, Arc::new(|| -> Result<f64> { bail!("no load") }));
        assert!(probe.probe().await.is_err());
    }
}
