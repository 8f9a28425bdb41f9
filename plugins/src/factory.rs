use std::sync::Arc;
use std::time::Duration;

use lull_core::config::AppConfig;
use lull_core::decompose::DecompositionRegistry;
use lull_core::error::ConfigError;
use lull_core::executor::{Executor, ExecutorOptions, RetryStrategyPlugin};
use lull_core::idle::{IdleProbe, IdleSource, IdleTrigger, IdleTriggerConfig, ProbeChain};
use lull_core::orchestrator::OrchestratorBuilder;
use lull_core::task::TaskStore;

use crate::decompose::{ParallelListStrategy, SequentialStrategy};
use crate::executor::{ExponentialBackoffPlugin, ImmediateRetryPlugin, LinearRetryPlugin};
use crate::idle::{IoregProbe, LoadAverageProbe, TtyIdleProbe, XprintidleProbe};

fn build_probe(name: &str, cfg: &AppConfig) -> Option<Arc<dyn IdleProbe>> {
    let timeout = Duration::from_millis(cfg.idle.probe_timeout_ms.max(1));
    match name.trim().to_ascii_lowercase().as_str() {
        "xprintidle" => Some(Arc::new(XprintidleProbe::new(timeout))),
        "ioreg" => Some(Arc::new(IoregProbe::new(timeout))),
        "tty" => Some(Arc::new(TtyIdleProbe::new())),
        "loadavg" => Some(Arc::new(LoadAverageProbe::new(cfg.idle.load_threshold))),
        _ => None,
    }
}

/// Probe chain in `idle.probes` order. Unknown names are skipped with a warning.
pub fn build_idle_source(cfg: &AppConfig) -> Arc<dyn IdleSource> {
    let mut chain = ProbeChain::default();
    for name in &cfg.idle.probes {
        match build_probe(name, cfg) {
            Some(probe) => chain = chain.push(probe),
            None => tracing::warn!(probe = %name, "unknown idle probe, skipping"),
        }
    }
    tracing::debug!(probes = ?chain.probe_names(), "idle source ready");
    Arc::new(chain)
}

/// Terminal-based user silence, when lull runs attached to a terminal.
pub fn build_user_silence_source(_cfg: &AppConfig) -> Option<Arc<dyn IdleSource>> {
    let probe = TtyIdleProbe::detect()?;
    Some(Arc::new(ProbeChain::new(vec![Arc::new(probe)])))
}

pub fn build_retry_strategy(cfg: &AppConfig) -> Result<Arc<dyn RetryStrategyPlugin>, ConfigError> {
    match cfg.retry.strategy.as_str() {
        "immediate" => Ok(Arc::new(ImmediateRetryPlugin)),
        "exponential-backoff" => Ok(Arc::new(ExponentialBackoffPlugin::new(cfg.retry.clone()))),
        "linear" => Ok(Arc::new(LinearRetryPlugin::new(cfg.retry.clone()))),
        other => Err(ConfigError::InvalidValue {
            field: "retry.strategy",
            reason: format!("unknown strategy {other:?}"),
        }),
    }
}

/// Built-in strategies, or an empty registry when `scheduler.decompose` is off.
pub fn build_decomposer(cfg: &AppConfig) -> DecompositionRegistry {
    if !cfg.scheduler.decompose {
        return DecompositionRegistry::new();
    }
    DecompositionRegistry::new()
        .with(Arc::new(SequentialStrategy))
        .with(Arc::new(ParallelListStrategy))
}

pub fn build_executor(cfg: &AppConfig, store: TaskStore) -> Result<Executor, ConfigError> {
    Ok(Executor::builder(store)
        .options(ExecutorOptions::from_config(&cfg.scheduler))
        .retry_strategy(build_retry_strategy(cfg)?)
        .build())
}

/// Fully wired builder; callers add callbacks before `build()`.
pub fn build_orchestrator(cfg: &AppConfig) -> Result<OrchestratorBuilder, ConfigError> {
    let executor = Arc::new(build_executor(cfg, TaskStore::new())?);
    let mut builder = OrchestratorBuilder::new(executor, build_idle_source(cfg))
        .trigger(IdleTrigger::new(IdleTriggerConfig::from(&cfg.idle)))
        .decomposer(build_decomposer(cfg))
        .heartbeat_interval(cfg.scheduler.heartbeat_interval());
    if let Some(source) = build_user_silence_source(cfg) {
        builder = builder.user_silence_source(source);
    }
    Ok(builder)
}
