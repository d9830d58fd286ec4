//! Resource gate for I/O-heavy work.
//!
//! The gate samples system-wide CPU and memory utilization and allows I/O only
//! when both are strictly below the configured ceilings. It keeps no state
//! between calls: a caller that is refused simply tries again on its next
//! trigger.
//!
//! # Sampling window
//!
//! [`SystemSampler`] refreshes CPU counters, waits
//! [`sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`] (about 200 ms on most platforms) and
//! refreshes again, so the CPU figure is the average over that window. Memory
//! is an instantaneous used/total ratio.

use super::error::LifecycleError;
use crate::state::ConfigStore;
use std::sync::{Arc, Mutex};
use sysinfo::System;

/// One utilization sample, both values in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub ram_percent: f32,
}

/// Source of utilization samples.
#[cfg_attr(test, mockall::automock)]
pub trait ResourceSampler: Send + Sync {
    fn sample(&self) -> Result<ResourceSample, LifecycleError>;
}

/// [`ResourceSampler`] backed by `sysinfo`.
pub struct SystemSampler {
    system: Mutex<System>,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SystemSampler {
    fn sample(&self) -> Result<ResourceSample, LifecycleError> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());

        system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();
        let cpu_percent = system.global_cpu_usage();

        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return Err(LifecycleError::ResourceSample(
                "total memory reported as zero".to_string(),
            ));
        }
        let ram_percent = (system.used_memory() as f64 / total as f64 * 100.0) as f32;

        if !cpu_percent.is_finite() || !ram_percent.is_finite() {
            return Err(LifecycleError::ResourceSample(format!(
                "non-finite sample: cpu={} ram={}",
                cpu_percent, ram_percent
            )));
        }

        Ok(ResourceSample {
            cpu_percent,
            ram_percent,
        })
    }
}

/// Go/no-go decision for I/O-heavy operations.
#[derive(Clone)]
pub struct ResourceGate {
    store: ConfigStore,
    sampler: Arc<dyn ResourceSampler>,
}

impl ResourceGate {
    pub fn new(store: ConfigStore, sampler: Arc<dyn ResourceSampler>) -> Self {
        Self { store, sampler }
    }

    /// Gate backed by the live system sampler.
    pub fn system(store: ConfigStore) -> Self {
        Self::new(store, Arc::new(SystemSampler::new()))
    }

    /// True only if CPU and RAM are both strictly below their ceilings.
    ///
    /// A failed sample cannot confirm capacity, so it denies.
    pub fn can_perform_io(&self) -> bool {
        let limits = self.store.resource_limits();

        match self.sampler.sample() {
            Ok(sample) => {
                let allowed = sample.cpu_percent < f32::from(limits.max_cpu_percent)
                    && sample.ram_percent < f32::from(limits.max_ram_percent);

                if !allowed {
                    tracing::debug!(
                        "I/O deferred: cpu={:.1}% (max {}), ram={:.1}% (max {})",
                        sample.cpu_percent,
                        limits.max_cpu_percent,
                        sample.ram_percent,
                        limits.max_ram_percent
                    );
                }
                allowed
            }
            Err(e) => {
                tracing::warn!("{}; denying I/O", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrganizerConfig;

    fn gate_with(sample: Result<ResourceSample, String>) -> ResourceGate {
        let mut sampler = MockResourceSampler::new();
        sampler
            .expect_sample()
            .returning(move || sample.clone().map_err(LifecycleError::ResourceSample));
        ResourceGate::new(ConfigStore::new(OrganizerConfig::default()), Arc::new(sampler))
    }

    fn sample(cpu: f32, ram: f32) -> Result<ResourceSample, String> {
        Ok(ResourceSample {
            cpu_percent: cpu,
            ram_percent: ram,
        })
    }

    #[test]
    fn test_allows_when_both_below() {
        assert!(gate_with(sample(10.0, 30.0)).can_perform_io());
    }

    #[test]
    fn test_denies_at_cpu_threshold() {
        assert!(!gate_with(sample(50.0, 30.0)).can_perform_io());
        assert!(!gate_with(sample(95.0, 30.0)).can_perform_io());
    }

    #[test]
    fn test_denies_at_ram_threshold() {
        assert!(!gate_with(sample(10.0, 70.0)).can_perform_io());
    }

    #[test]
    fn test_denies_on_sample_failure() {
        assert!(!gate_with(Err("unavailable".to_string())).can_perform_io());
    }

    #[test]
    fn test_rereads_limits_per_call() {
        let store = ConfigStore::new(OrganizerConfig::default());
        let mut sampler = MockResourceSampler::new();
        sampler.expect_sample().times(2).returning(|| {
            Ok(ResourceSample {
                cpu_percent: 40.0,
                ram_percent: 10.0,
            })
        });
        let gate = ResourceGate::new(store.clone(), Arc::new(sampler));

        assert!(gate.can_perform_io());
        store
            .update(|c| c.resource_limits.max_cpu_percent = 30)
            .unwrap();
        assert!(!gate.can_perform_io());
    }

    #[test]
    fn test_system_sampler_reports_percentages() {
        let sample = SystemSampler::new().sample().unwrap();
        assert!(sample.ram_percent >= 0.0 && sample.ram_percent <= 100.0);
        assert!(sample.cpu_percent >= 0.0);
    }
}
