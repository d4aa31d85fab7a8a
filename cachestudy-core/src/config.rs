//! Simulation configuration.
//!
//! Configuration is grouped by concern, with defaults matching the
//! baseline study and named presets for the scenario variants. Build a
//! config, adjust fields, then call [`SimulationConfig::validate`]
//! before handing it to the engine.

use thiserror::Error;

use crate::resource::LatencyModel;
use crate::workload::{ArrivalModel, KeyModel};

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: f64 },

    #[error("{what} must be within [0, 1], got {value}")]
    OutOfUnitRange { what: &'static str, value: f64 },

    #[error("{what} capacity must be at least 1")]
    ZeroCapacity { what: &'static str },

    #[error("invalid {what}: {detail}")]
    InvalidDistribution { what: &'static str, detail: String },
}

/// Run-level knobs: horizon, seeding, prefill, cache TTL policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Simulated run length in milliseconds.
    pub duration_ms: f64,
    /// Seed for every stochastic draw in the run.
    pub seed: u64,
    /// Keys written to both tiers before the first arrival.
    pub prefill_keys: u64,
    /// TTL applied to cache writes for workload keys.
    pub key_cache_ttl_ms: f64,
    /// Probability that a cache hit attempts a TTL extension.
    pub ttl_extension_probability: f64,
    /// Optional one-shot bulk invalidation of the cache.
    pub invalidation: Option<InvalidationConfig>,
}

/// A scheduled bulk invalidation event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidationConfig {
    /// When the sweep fires, in milliseconds from run start.
    pub at_ms: f64,
    /// Independent drop probability per cache entry.
    pub fraction: f64,
}

/// Workload shape: arrival process and key popularity.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub arrivals: ArrivalModel,
    pub keys: KeyModel,
}

/// One storage tier's concurrency and latency characteristics.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    /// Concurrent operations the tier can service.
    pub capacity: usize,
    /// How long a request queues for admission before giving up.
    pub admission_timeout_ms: f64,
    pub latency: LatencyModel,
}

/// Complete configuration for one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub run: RunConfig,
    pub workload: WorkloadConfig,
    pub cache: ResourceConfig,
    pub database: ResourceConfig,
}

impl Default for SimulationConfig {
    /// Baseline study: one hour, Poisson arrivals, Pareto key skew,
    /// fast wide cache over a slow narrow database, no TTL extension.
    fn default() -> Self {
        Self {
            run: RunConfig {
                duration_ms: 3_600_000.0,
                seed: 42,
                prefill_keys: 10_000,
                key_cache_ttl_ms: 1_200_000.0,
                ttl_extension_probability: 0.0,
                invalidation: None,
            },
            workload: WorkloadConfig {
                arrivals: ArrivalModel::Exponential { lambda: 0.1 },
                keys: KeyModel::Pareto {
                    alpha: 0.25,
                    k: 12.5,
                    modulo: 1_000_003,
                },
            },
            cache: ResourceConfig {
                capacity: 100_000,
                admission_timeout_ms: 200.0,
                latency: LatencyModel::LogNormalShifted {
                    min_ms: 5.0,
                    mean_ms: 10.0,
                    mu: 0.05,
                    sigma: 0.25,
                },
            },
            database: ResourceConfig {
                capacity: 1_000,
                admission_timeout_ms: 5_000.0,
                latency: LatencyModel::LogNormalShifted {
                    min_ms: 250.0,
                    mean_ms: 500.0,
                    mu: 0.05,
                    sigma: 0.25,
                },
            },
        }
    }
}

impl SimulationConfig {
    /// Baseline with TTL extension enabled on half of all cache hits.
    pub fn ttl_extension() -> Self {
        let mut config = Self::default();
        config.run.ttl_extension_probability = 0.5;
        config
    }

    /// Stampede study: short TTLs, a full cache wipe one minute in, and
    /// tight resources so the miss storm is visible.
    pub fn stampede() -> Self {
        Self {
            run: RunConfig {
                duration_ms: 600_000.0,
                seed: 42,
                prefill_keys: 5_000,
                key_cache_ttl_ms: 60_000.0,
                ttl_extension_probability: 0.0,
                invalidation: Some(InvalidationConfig {
                    at_ms: 60_000.0,
                    fraction: 1.0,
                }),
            },
            workload: WorkloadConfig {
                arrivals: ArrivalModel::Normal {
                    mean_ms: 1.0,
                    dev_ms: 0.1,
                },
                keys: KeyModel::Uniform { max: 5_000 },
            },
            cache: ResourceConfig {
                capacity: 100,
                admission_timeout_ms: 100.0,
                latency: LatencyModel::Normal {
                    mean_ms: 10.0,
                    dev_ms: 1.0,
                },
            },
            database: ResourceConfig {
                capacity: 10,
                admission_timeout_ms: 1_000.0,
                latency: LatencyModel::Normal {
                    mean_ms: 100.0,
                    dev_ms: 10.0,
                },
            },
        }
    }

    /// Dynamic-expiration study: large hot key space, six-minute TTLs,
    /// mid-sized tiers.
    pub fn dynamic_expiration() -> Self {
        Self {
            run: RunConfig {
                duration_ms: 3_600_000.0,
                seed: 42,
                prefill_keys: 100_000,
                key_cache_ttl_ms: 360_000.0,
                ttl_extension_probability: 0.0,
                invalidation: None,
            },
            workload: WorkloadConfig {
                arrivals: ArrivalModel::Exponential { lambda: 0.1 },
                keys: KeyModel::Pareto {
                    alpha: 0.5,
                    k: 5.0,
                    modulo: 6_969_691,
                },
            },
            cache: ResourceConfig {
                capacity: 10_000,
                admission_timeout_ms: 100.0,
                latency: LatencyModel::Normal {
                    mean_ms: 10.0,
                    dev_ms: 1.0,
                },
            },
            database: ResourceConfig {
                capacity: 100,
                admission_timeout_ms: 2_000.0,
                latency: LatencyModel::Normal {
                    mean_ms: 250.0,
                    dev_ms: 25.0,
                },
            },
        }
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("run duration", self.run.duration_ms)?;
        require_positive("key cache TTL", self.run.key_cache_ttl_ms)?;
        require_unit_range(
            "TTL extension probability",
            self.run.ttl_extension_probability,
        )?;
        if let Some(invalidation) = &self.run.invalidation {
            if invalidation.at_ms < 0.0 || !invalidation.at_ms.is_finite() {
                return Err(ConfigError::NonPositive {
                    what: "invalidation time",
                    value: invalidation.at_ms,
                });
            }
            require_unit_range("invalidation fraction", invalidation.fraction)?;
        }
        self.workload.arrivals.validate()?;
        self.workload.keys.validate()?;
        validate_resource("cache", &self.cache)?;
        validate_resource("database", &self.database)?;
        Ok(())
    }
}

fn validate_resource(what: &'static str, resource: &ResourceConfig) -> Result<(), ConfigError> {
    if resource.capacity == 0 {
        return Err(ConfigError::ZeroCapacity { what });
    }
    require_positive("admission timeout", resource.admission_timeout_ms)?;
    Ok(())
}

pub(crate) fn require_positive(what: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { what, value })
    }
}

pub(crate) fn require_unit_range(what: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { what, value })
    }
}
