//! Discrete-event simulation of a two-tier cache system.
//!
//! Models a bounded-concurrency cache in front of a bounded-concurrency
//! database under a synthetic request workload. Requests race admission
//! timeouts against slot grants, cache entries expire by TTL, and every
//! completed request is classified and sampled for offline analysis.
//!
//! Runs are fully deterministic: a configuration and a seed reproduce
//! the same event sequence, counters, and samples every time.
//!
//! # Example
//!
//! ```
//! use cachestudy_core::{Simulation, SimulationConfig};
//!
//! let mut config = SimulationConfig::stampede();
//! config.run.duration_ms = 5_000.0;
//!
//! let mut sim = Simulation::new(config)?;
//! let summary = sim.run()?;
//! assert_eq!(summary.requests, summary.ok + summary.fails + sim.in_flight() as u64);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub(crate) mod backend;
pub mod clock;
pub mod config;
pub mod engine;
pub(crate) mod events;
pub mod resource;
pub mod stats;
pub mod store;
pub mod workload;

pub use backend::RequestId;
pub use clock::{SimClock, SimRng, SimTime};
pub use config::{
    ConfigError, InvalidationConfig, ResourceConfig, RunConfig, SimulationConfig, WorkloadConfig,
};
pub use engine::{RunSummary, Simulation, SimulationError};
pub use resource::{Admission, LatencyModel, ServiceResource, ServiceTimeSampler, Target, Ticket};
pub use stats::{Outcome, Sample, StatsSink};
pub use store::{Key, RemainingTtl, TtlStore};
pub use workload::{placeholder_value, ArrivalModel, ArrivalProcess, KeyModel, KeySelector};
