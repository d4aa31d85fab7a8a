//! Workload generation: arrival gaps and key popularity.

use rand_distr::{Exp, Normal, Pareto, Zipf};

use crate::clock::SimRng;
use crate::config::{require_positive, ConfigError};
use crate::store::Key;

/// Inter-arrival gap distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrivalModel {
    /// Poisson process: exponential gaps with rate `lambda` per
    /// millisecond.
    Exponential { lambda: f64 },
    /// Near-constant gaps: normal around `mean_ms`, truncated at zero.
    Normal { mean_ms: f64, dev_ms: f64 },
}

impl ArrivalModel {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            ArrivalModel::Exponential { lambda } => require_positive("arrival rate", lambda),
            ArrivalModel::Normal { mean_ms, .. } => {
                require_positive("arrival gap mean", mean_ms)
            }
        }
    }
}

#[derive(Debug, Clone)]
enum PreparedArrivals {
    Exponential(Exp<f64>),
    Normal(Normal<f64>),
}

/// Draws successive inter-arrival gaps for one run.
#[derive(Debug, Clone)]
pub struct ArrivalProcess {
    prepared: PreparedArrivals,
}

impl ArrivalProcess {
    /// Builds the process from its model description.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidDistribution` - If the model's parameters
    ///   are rejected by the underlying distribution
    pub fn from_model(model: &ArrivalModel) -> Result<Self, ConfigError> {
        let prepared = match *model {
            ArrivalModel::Exponential { lambda } => {
                let dist = Exp::new(lambda).map_err(|source| {
                    ConfigError::InvalidDistribution {
                        what: "exponential arrivals",
                        detail: source.to_string(),
                    }
                })?;
                PreparedArrivals::Exponential(dist)
            }
            ArrivalModel::Normal { mean_ms, dev_ms } => {
                let dist = Normal::new(mean_ms, dev_ms).map_err(|source| {
                    ConfigError::InvalidDistribution {
                        what: "normal arrivals",
                        detail: source.to_string(),
                    }
                })?;
                PreparedArrivals::Normal(dist)
            }
        };
        Ok(Self { prepared })
    }

    /// Milliseconds until the next arrival. Never negative.
    pub fn next_gap(&self, rng: &mut SimRng) -> f64 {
        match &self.prepared {
            PreparedArrivals::Exponential(dist) => rng.sample(dist),
            PreparedArrivals::Normal(dist) => rng.sample(dist).max(0.0),
        }
    }
}

/// Key popularity distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyModel {
    /// Heavy-tailed skew: a Pareto draw scaled by `k` and folded into
    /// the key space by `modulo`. A prime modulo keeps the fold from
    /// aliasing the tail onto a few residues.
    Pareto { alpha: f64, k: f64, modulo: u64 },
    /// Zipfian ranks over `n` keys with the given exponent.
    Zipf { n: u64, exponent: f64 },
    /// Uniform over `[0, max)`.
    Uniform { max: u64 },
}

impl KeyModel {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            KeyModel::Pareto { alpha, k, modulo } => {
                require_positive("Pareto shape", alpha)?;
                require_positive("Pareto scale", k)?;
                require_positive("Pareto modulo", modulo as f64)
            }
            KeyModel::Zipf { n, exponent } => {
                require_positive("Zipf key count", n as f64)?;
                require_positive("Zipf exponent", exponent)
            }
            KeyModel::Uniform { max } => require_positive("uniform key count", max as f64),
        }
    }
}

#[derive(Debug, Clone)]
enum PreparedKeys {
    Pareto {
        dist: Pareto<f64>,
        k: f64,
        modulo: u64,
    },
    Zipf(Zipf<f64>),
    Uniform {
        max: u64,
    },
}

/// Draws workload keys for one run.
#[derive(Debug, Clone)]
pub struct KeySelector {
    prepared: PreparedKeys,
}

impl KeySelector {
    /// Builds the selector from its model description.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidDistribution` - If the model's parameters
    ///   are rejected by the underlying distribution
    pub fn from_model(model: &KeyModel) -> Result<Self, ConfigError> {
        let prepared = match *model {
            KeyModel::Pareto { alpha, k, modulo } => {
                let dist = Pareto::new(1.0, alpha).map_err(|source| {
                    ConfigError::InvalidDistribution {
                        what: "Pareto key skew",
                        detail: source.to_string(),
                    }
                })?;
                PreparedKeys::Pareto { dist, k, modulo }
            }
            KeyModel::Zipf { n, exponent } => {
                let dist = Zipf::new(n as f64, exponent).map_err(|source| {
                    ConfigError::InvalidDistribution {
                        what: "Zipf key skew",
                        detail: source.to_string(),
                    }
                })?;
                PreparedKeys::Zipf(dist)
            }
            KeyModel::Uniform { max } => PreparedKeys::Uniform { max },
        };
        Ok(Self { prepared })
    }

    /// Draws the next key.
    pub fn next_key(&self, rng: &mut SimRng) -> Key {
        match &self.prepared {
            PreparedKeys::Pareto { dist, k, modulo } => {
                // The distribution's support starts at 1; shift to zero
                // before scaling so the hottest keys sit near zero.
                let sample = rng.sample(dist) - 1.0;
                fold_key(sample * k, *modulo)
            }
            PreparedKeys::Zipf(dist) => rng.sample(dist) as Key - 1,
            PreparedKeys::Uniform { max } => rng.uniform(0.0, *max as f64) as Key,
        }
    }
}

/// Folds a scaled draw into `[0, modulo)`.
///
/// The fold happens in the float domain: extreme tail draws exceed the
/// integer range, and casting first would saturate them all onto the
/// one residue of `u64::MAX`.
fn fold_key(scaled: f64, modulo: u64) -> Key {
    (scaled.rem_euclid(modulo as f64) as Key) % modulo
}

/// Synthetic payload stored under `key`.
pub fn placeholder_value(key: Key) -> String {
    format!("value-{key}")
}
