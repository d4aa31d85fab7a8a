//! The simulation engine.
//!
//! `Simulation` owns the clock, the event queue, both storage tiers,
//! the workload generators, and the stats sink, and advances simulated
//! time by draining events in timestamp order. Everything runs on the
//! calling thread; concurrency in the modeled system is interleaving
//! of events, not parallelism.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::backend::{self, OpResult, RequestId, RequestTask, Step};
use crate::clock::{SimClock, SimRng, SimTime};
use crate::config::{ConfigError, SimulationConfig};
use crate::events::{Event, EventQueue};
use crate::resource::{Admission, ServiceResource, ServiceTimeSampler, Target};
use crate::stats::{Sample, StatsSink};
use crate::store::{Key, TtlStore};
use crate::workload::{placeholder_value, ArrivalProcess, KeySelector};

/// Pending-event ceiling. A healthy run stays far below this; hitting
/// it means arrivals outpace completions without bound.
const MAX_EVENT_QUEUE_SIZE: usize = 1_000_000;

/// Errors during simulation execution.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("time reversal: clock at {from}, event at {to}")]
    TimeReversal { from: SimTime, to: SimTime },

    #[error("event queue exceeded {count} pending events")]
    EventQueueOverflow { count: usize },
}

/// Counters summarizing one finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub requests: u64,
    pub ok: u64,
    pub fails: u64,
    pub events_processed: u64,
    pub simulated_ms: f64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests ({} ok, {} fails) over {:.0}ms simulated, {} events",
            self.requests, self.ok, self.fails, self.simulated_ms, self.events_processed
        )
    }
}

/// A two-tier cache system under a synthetic workload.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    clock: SimClock,
    queue: EventQueue,
    rng: SimRng,
    cache_resource: ServiceResource,
    cache_store: TtlStore,
    db_resource: ServiceResource,
    db_store: TtlStore,
    arrivals: ArrivalProcess,
    keys: KeySelector,
    tasks: HashMap<RequestId, RequestTask>,
    next_request: RequestId,
    stats: StatsSink,
    events_processed: u64,
}

impl Simulation {
    /// Builds a simulation from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found in the configuration or
    /// its distribution parameters.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache_sampler = ServiceTimeSampler::from_model(&config.cache.latency)?;
        let db_sampler = ServiceTimeSampler::from_model(&config.database.latency)?;
        let arrivals = ArrivalProcess::from_model(&config.workload.arrivals)?;
        let keys = KeySelector::from_model(&config.workload.keys)?;

        // Writes without an explicit TTL must outlive the run.
        let default_ttl_ms = config.run.duration_ms + 1.0;

        Ok(Self {
            cache_resource: ServiceResource::new(
                config.cache.capacity,
                config.cache.admission_timeout_ms,
                cache_sampler,
            ),
            cache_store: TtlStore::new(default_ttl_ms),
            db_resource: ServiceResource::new(
                config.database.capacity,
                config.database.admission_timeout_ms,
                db_sampler,
            ),
            db_store: TtlStore::new(default_ttl_ms),
            arrivals,
            keys,
            clock: SimClock::new(),
            queue: EventQueue::new(),
            rng: SimRng::from_seed(config.run.seed),
            tasks: HashMap::new(),
            next_request: 0,
            stats: StatsSink::new(),
            events_processed: 0,
            config,
        })
    }

    /// Runs the configured scenario to completion.
    ///
    /// # Errors
    ///
    /// - `SimulationError::TimeReversal` - If an event fires in the past
    /// - `SimulationError::EventQueueOverflow` - If pending events
    ///   exceed the safety ceiling
    pub fn run(&mut self) -> Result<RunSummary, SimulationError> {
        self.prefill();
        self.start_workload();
        self.run_until(SimTime::from_millis(self.config.run.duration_ms))?;
        Ok(self.summary())
    }

    /// Seeds both tiers with the configured number of keys.
    ///
    /// Prefill is instantaneous: it models state left by earlier
    /// traffic, not work done during the run. Cache TTLs are jittered
    /// uniformly over `[0, ttl)` so the run does not open with a
    /// synchronized mass expiry.
    pub fn prefill(&mut self) {
        let now = self.clock.now();
        let ttl = self.config.run.key_cache_ttl_ms;
        for key in 0..self.config.run.prefill_keys {
            self.db_store.set(key, placeholder_value(key), None, now);
            let jittered = self.rng.uniform(0.0, ttl);
            self.cache_store
                .set(key, placeholder_value(key), Some(jittered), now);
        }
        info!(
            keys = self.config.run.prefill_keys,
            "prefilled cache and database"
        );
    }

    /// Schedules the first arrival and any configured invalidation.
    pub fn start_workload(&mut self) {
        let gap = self.arrivals.next_gap(&mut self.rng);
        let first = self.clock.now().after(gap);
        self.queue.push(first, Event::Arrival { key: None });

        if let Some(invalidation) = self.config.run.invalidation {
            self.queue.push(
                SimTime::from_millis(invalidation.at_ms),
                Event::Invalidation {
                    fraction: invalidation.fraction,
                },
            );
        }
    }

    /// Injects a single request for `key`, `delay_ms` from now.
    ///
    /// Unlike workload arrivals, an injected request does not schedule
    /// a successor.
    pub fn schedule_request(&mut self, delay_ms: f64, key: Key) {
        self.queue
            .push(self.clock.now().after(delay_ms), Event::Arrival { key: Some(key) });
    }

    /// Drains events up to and including `deadline`, then advances the
    /// clock to `deadline`.
    ///
    /// Events scheduled past the deadline stay queued; requests still
    /// in flight at the deadline are abandoned unrecorded, as if the
    /// observation window simply closed.
    pub fn run_until(&mut self, deadline: SimTime) -> Result<(), SimulationError> {
        while let Some(at) = self.queue.peek_time() {
            if at > deadline {
                break;
            }
            if self.queue.len() > MAX_EVENT_QUEUE_SIZE {
                return Err(SimulationError::EventQueueOverflow {
                    count: self.queue.len(),
                });
            }
            // Pop cannot fail after a successful peek.
            let Some(scheduled) = self.queue.pop() else {
                break;
            };
            self.clock.advance_to(scheduled.at)?;
            self.dispatch(scheduled.event);
            self.events_processed += 1;
        }
        if deadline > self.clock.now() {
            self.clock.advance_to(deadline)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Arrival { key } => self.on_arrival(key),
            Event::ServiceComplete { request, target } => self.on_service_complete(request, target),
            Event::AdmissionExpired {
                request,
                target,
                ticket,
            } => self.on_admission_expired(request, target, ticket),
            Event::Invalidation { fraction } => {
                let removed = self.cache_store.invalidate_fraction(fraction, &mut self.rng);
                info!(
                    removed,
                    fraction,
                    at = %self.clock.now(),
                    "cache invalidation sweep"
                );
            }
        }
    }

    fn on_arrival(&mut self, key: Option<Key>) {
        let from_workload = key.is_none();
        let key = match key {
            Some(key) => key,
            None => self.keys.next_key(&mut self.rng),
        };

        self.stats.record_arrival();
        let request = self.next_request;
        self.next_request += 1;
        let task = RequestTask::new(key, self.clock.now());
        trace!(request, key, at = %self.clock.now(), "request arrived");
        self.tasks.insert(request, task);
        self.begin_op(request, Target::Cache);

        if from_workload {
            let gap = self.arrivals.next_gap(&mut self.rng);
            self.queue
                .push(self.clock.now().after(gap), Event::Arrival { key: None });
        }
    }

    /// Asks `target` for a slot and schedules either the completion or
    /// the admission timeout.
    fn begin_op(&mut self, request: RequestId, target: Target) {
        let now = self.clock.now();
        let admission = match target {
            Target::Cache => self.cache_resource.admit(request, &mut self.rng),
            Target::Database => self.db_resource.admit(request, &mut self.rng),
        };
        match admission {
            Admission::Granted { service_ms } => {
                self.queue
                    .push(now.after(service_ms), Event::ServiceComplete { request, target });
            }
            Admission::Queued { ticket, timeout_ms } => {
                self.queue.push(
                    now.after(timeout_ms),
                    Event::AdmissionExpired {
                        request,
                        target,
                        ticket,
                    },
                );
            }
        }
    }

    fn on_service_complete(&mut self, request: RequestId, target: Target) {
        let now = self.clock.now();
        let Some(mut task) = self.tasks.remove(&request) else {
            debug_assert!(false, "service completion for unknown request {request}");
            return;
        };

        // The operation's effect lands now, while the slot is held.
        let result = self.perform_op(&mut task, now);

        // Free the slot; a queued waiter takes it over directly.
        let released = match target {
            Target::Cache => self.cache_resource.release(&mut self.rng),
            Target::Database => self.db_resource.release(&mut self.rng),
        };
        if let Some((granted, service_ms)) = released {
            self.queue.push(
                now.after(service_ms),
                Event::ServiceComplete {
                    request: granted,
                    target,
                },
            );
        }

        let step = backend::advance(
            &mut task,
            result,
            &self.cache_store,
            now,
            self.config.run.ttl_extension_probability,
            &mut self.rng,
        );
        self.execute_step(request, task, step);
    }

    fn on_admission_expired(&mut self, request: RequestId, target: Target, ticket: u64) {
        // A stale ticket means the waiter was granted a slot at or
        // before this instant; the timeout loses the race.
        if !self.resource_mut(target).cancel(ticket) {
            trace!(request, target = target.as_str(), "stale admission timeout ignored");
            return;
        }
        let now = self.clock.now();
        let Some(mut task) = self.tasks.remove(&request) else {
            debug_assert!(false, "admission timeout for unknown request {request}");
            return;
        };
        debug!(
            request,
            key = task.key,
            target = target.as_str(),
            "admission timed out"
        );
        let step = backend::advance(
            &mut task,
            OpResult::TimedOut,
            &self.cache_store,
            now,
            self.config.run.ttl_extension_probability,
            &mut self.rng,
        );
        self.execute_step(request, task, step);
    }

    /// Executes the store operation for the task's current phase.
    fn perform_op(&mut self, task: &mut RequestTask, now: SimTime) -> OpResult {
        if task.phase.is_write() {
            // Writes only ever target the cache tier.
            if let Some(value) = task.pending_value.take() {
                self.cache_store.set(
                    task.key,
                    value,
                    Some(self.config.run.key_cache_ttl_ms),
                    now,
                );
            }
            return OpResult::Wrote;
        }
        let store = match task.phase.target() {
            Target::Cache => &self.cache_store,
            Target::Database => &self.db_store,
        };
        OpResult::Value(store.get(task.key, now).map(str::to_string))
    }

    fn execute_step(&mut self, request: RequestId, task: RequestTask, step: Step) {
        match step {
            Step::StartOp => {
                let target = task.phase.target();
                self.tasks.insert(request, task);
                self.begin_op(request, target);
            }
            Step::Finish { outcome } => {
                let now = self.clock.now();
                let sample = Sample {
                    timestamp: task.arrived_at,
                    outcome,
                    latency_ms: now.since(task.arrived_at),
                    key: task.key,
                };
                debug!(
                    request,
                    key = task.key,
                    outcome = outcome.as_str(),
                    latency_ms = sample.latency_ms,
                    "request finished"
                );
                self.stats.record(sample);
            }
        }
    }

    fn resource_mut(&mut self, target: Target) -> &mut ServiceResource {
        match target {
            Target::Cache => &mut self.cache_resource,
            Target::Database => &mut self.db_resource,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// The cache tier's store.
    pub fn cache(&self) -> &TtlStore {
        &self.cache_store
    }

    /// The database tier's store.
    pub fn database(&self) -> &TtlStore {
        &self.db_store
    }

    pub fn stats(&self) -> &StatsSink {
        &self.stats
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Requests admitted or queued right now.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            requests: self.stats.requests(),
            ok: self.stats.ok(),
            fails: self.stats.fails(),
            events_processed: self.events_processed,
            simulated_ms: self.clock.now().as_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResourceConfig, RunConfig, WorkloadConfig};
    use crate::resource::LatencyModel;
    use crate::stats::Outcome;
    use crate::workload::{ArrivalModel, KeyModel};

    /// Tiny deterministic system: fixed service times, no workload
    /// noise unless a test starts the workload itself.
    fn probe_config() -> SimulationConfig {
        SimulationConfig {
            run: RunConfig {
                duration_ms: 10_000.0,
                seed: 1,
                prefill_keys: 10,
                key_cache_ttl_ms: 1_000.0,
                ttl_extension_probability: 0.0,
                invalidation: None,
            },
            workload: WorkloadConfig {
                arrivals: ArrivalModel::Normal {
                    mean_ms: 1.0,
                    dev_ms: 0.0,
                },
                keys: KeyModel::Uniform { max: 10 },
            },
            cache: ResourceConfig {
                capacity: 2,
                admission_timeout_ms: 50.0,
                latency: LatencyModel::Normal {
                    mean_ms: 10.0,
                    dev_ms: 0.0,
                },
            },
            database: ResourceConfig {
                capacity: 1,
                admission_timeout_ms: 500.0,
                latency: LatencyModel::Normal {
                    mean_ms: 100.0,
                    dev_ms: 0.0,
                },
            },
        }
    }

    #[test]
    fn refreshed_key_serves_a_cache_hit() {
        let mut sim = Simulation::new(probe_config()).unwrap();
        sim.prefill();
        // Prefill TTLs are jittered within [0, 1000); by t=5000 every
        // prefilled cache entry is expired. The first request misses,
        // refreshes the key with the full 1000ms TTL, and the second
        // request hits it.
        sim.schedule_request(5_000.0, 3);
        sim.schedule_request(5_500.0, 3);
        sim.run_until(SimTime::from_millis(10_000.0)).unwrap();

        let samples = sim.stats().samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].outcome, Outcome::CacheMissDbOk);
        // cache read 10 + db read 100 + cache write 10
        assert_eq!(samples[0].latency_ms, 120.0);
        assert_eq!(samples[1].outcome, Outcome::CacheHit);
        assert_eq!(samples[1].latency_ms, 10.0);
        assert_eq!(samples[1].key, 3);
    }

    #[test]
    fn unknown_key_completes_without_caching() {
        let mut sim = Simulation::new(probe_config()).unwrap();
        sim.prefill();
        // Key 100 exists in neither tier.
        sim.schedule_request(0.0, 100);
        sim.run_until(SimTime::from_millis(1_000.0)).unwrap();

        let samples = sim.stats().samples();
        assert_eq!(samples.len(), 1);
        // The database has no row: completes ok, nothing cached.
        assert_eq!(samples[0].outcome, Outcome::CacheMissDbOk);
        // cache read 10 + db read 100, no write-back
        assert_eq!(samples[0].latency_ms, 110.0);
        assert_eq!(sim.cache().get(100, sim.now()), None);
    }

    #[test]
    fn expired_cache_entry_is_refreshed_from_database() {
        let mut sim = Simulation::new(probe_config()).unwrap();
        sim.prefill();
        // Every prefilled entry expires within [0, 1000); at t=2000 the
        // cache misses but the database still has the row.
        sim.schedule_request(2_000.0, 5);
        sim.run_until(SimTime::from_millis(2_500.0)).unwrap();

        let samples = sim.stats().samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].outcome, Outcome::CacheMissDbOk);
        assert_eq!(samples[0].latency_ms, 120.0);
        // Written back at t=2120 with the full 1000ms TTL.
        assert_eq!(sim.cache().get(5, sim.now()), Some("value-5"));
    }

    #[test]
    fn cache_contention_times_out_excess_requests() {
        // Warm key 1 with a full-TTL write-back (completes t=5120,
        // expires t=6120), then hammer it at t=6000. Capacity 2,
        // service 10ms, admission timeout 50ms: slots turn over two per
        // 10ms, so eight simultaneous requests all start within 40ms
        // and finish served.
        let mut sim = Simulation::new(probe_config()).unwrap();
        sim.prefill();
        sim.schedule_request(5_000.0, 1);
        for _ in 0..8 {
            sim.schedule_request(6_000.0, 1);
        }
        sim.run_until(SimTime::from_millis(7_000.0)).unwrap();
        assert_eq!(sim.stats().ok(), 9);
        assert_eq!(sim.stats().fails(), 0);

        // Saturate past the timeout horizon: with 14 requests the last
        // waiters would need 60ms, past the 50ms admission timeout.
        let mut sim = Simulation::new(probe_config()).unwrap();
        sim.prefill();
        sim.schedule_request(5_000.0, 1);
        for _ in 0..14 {
            sim.schedule_request(6_000.0, 1);
        }
        sim.run_until(SimTime::from_millis(7_000.0)).unwrap();
        assert!(sim.stats().fails() > 0);
        assert_eq!(sim.stats().ok() + sim.stats().fails(), 15);
        let timed_out = sim
            .stats()
            .samples()
            .iter()
            .filter(|s| s.outcome == Outcome::CacheFail)
            .count() as u64;
        assert_eq!(timed_out, sim.stats().fails());
    }

    #[test]
    fn full_runs_are_deterministic() {
        let mut config = probe_config();
        config.run.duration_ms = 20_000.0;

        let mut first = Simulation::new(config.clone()).unwrap();
        let mut second = Simulation::new(config).unwrap();
        let summary1 = first.run().unwrap();
        let summary2 = second.run().unwrap();

        assert_eq!(summary1, summary2);
        assert_eq!(first.stats().samples(), second.stats().samples());
        assert!(summary1.requests > 0);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut config = probe_config();
        config.workload.arrivals = ArrivalModel::Exponential { lambda: 0.1 };
        config.run.duration_ms = 20_000.0;

        let mut first = Simulation::new(config.clone()).unwrap();
        config.run.seed = 2;
        let mut second = Simulation::new(config).unwrap();

        let summary1 = first.run().unwrap();
        let summary2 = second.run().unwrap();
        assert_ne!(first.stats().samples(), second.stats().samples());
        assert!(summary1.requests > 0 && summary2.requests > 0);
    }

    #[test]
    fn clock_lands_on_deadline() {
        let mut sim = Simulation::new(probe_config()).unwrap();
        sim.run_until(SimTime::from_millis(123.0)).unwrap();
        assert_eq!(sim.now().as_millis(), 123.0);
    }

    #[test]
    fn invalidation_event_wipes_cache() {
        let mut config = probe_config();
        config.run.invalidation = Some(crate::config::InvalidationConfig {
            at_ms: 100.0,
            fraction: 1.0,
        });
        let mut sim = Simulation::new(config).unwrap();
        sim.prefill();
        assert_eq!(sim.cache().len(), 10);

        sim.start_workload();
        sim.run_until(SimTime::from_millis(150.0)).unwrap();
        // Workload may have written a key back after the sweep, but the
        // prefilled population is gone.
        assert!(sim.cache().len() < 10);
    }

    #[test]
    fn summary_reports_counters() {
        let mut sim = Simulation::new(probe_config()).unwrap();
        sim.prefill();
        sim.schedule_request(0.0, 1);
        sim.run_until(SimTime::from_millis(1_000.0)).unwrap();

        let summary = sim.summary();
        assert_eq!(summary.requests, 1);
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.fails, 0);
        assert_eq!(summary.simulated_ms, 1_000.0);
        assert!(summary.events_processed >= 2);
    }
}
