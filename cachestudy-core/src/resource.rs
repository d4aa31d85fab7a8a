//! Bounded-concurrency service resources.
//!
//! Each storage tier is fronted by a `ServiceResource`: a fixed number
//! of slots, a FIFO waiter queue for requests that find every slot
//! busy, and an admission timeout bounding how long a waiter is willing
//! to queue. Service times are drawn from a per-resource latency model.
//!
//! Admission timeouts race against slot grants. Every queued waiter is
//! issued a ticket; the timeout event carries the ticket and cancels
//! the waiter only if it is still queued, so a waiter granted a slot at
//! the same instant its timeout fires is never resumed twice and never
//! leaks the slot.

use std::collections::VecDeque;

use rand_distr::{LogNormal, Normal};

use crate::backend::RequestId;
use crate::clock::SimRng;
use crate::config::ConfigError;

/// Which storage tier an operation is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Cache,
    Database,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Cache => "cache",
            Target::Database => "database",
        }
    }
}

/// Identifies one entry in a resource's waiter queue.
///
/// Tickets are unique per resource for the lifetime of a run and are
/// never reused, so a stale timeout can always be told apart from a
/// live one.
pub type Ticket = u64;

/// Describes how long one service operation takes.
#[derive(Debug, Clone, PartialEq)]
pub enum LatencyModel {
    /// Log-normal body shifted so no sample falls below `min_ms`, with
    /// the bulk of the mass around `mean_ms`.
    LogNormalShifted {
        min_ms: f64,
        mean_ms: f64,
        mu: f64,
        sigma: f64,
    },
    /// Normal around `mean_ms`, truncated at zero.
    Normal { mean_ms: f64, dev_ms: f64 },
}

/// A latency model with its distribution objects built up front.
#[derive(Debug, Clone)]
enum PreparedLatency {
    LogNormalShifted {
        min_ms: f64,
        scale_ms: f64,
        dist: LogNormal<f64>,
    },
    Normal(Normal<f64>),
}

/// Draws service times for one resource.
#[derive(Debug, Clone)]
pub struct ServiceTimeSampler {
    prepared: PreparedLatency,
}

impl ServiceTimeSampler {
    /// Builds a sampler from a latency model description.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidDistribution` - If the model's parameters
    ///   are rejected by the underlying distribution
    pub fn from_model(model: &LatencyModel) -> Result<Self, ConfigError> {
        let prepared = match *model {
            LatencyModel::LogNormalShifted {
                min_ms,
                mean_ms,
                mu,
                sigma,
            } => {
                let dist = LogNormal::new(mu, sigma).map_err(|source| {
                    ConfigError::InvalidDistribution {
                        what: "log-normal service time",
                        detail: source.to_string(),
                    }
                })?;
                PreparedLatency::LogNormalShifted {
                    min_ms,
                    scale_ms: mean_ms - min_ms,
                    dist,
                }
            }
            LatencyModel::Normal { mean_ms, dev_ms } => {
                let dist = Normal::new(mean_ms, dev_ms).map_err(|source| {
                    ConfigError::InvalidDistribution {
                        what: "normal service time",
                        detail: source.to_string(),
                    }
                })?;
                PreparedLatency::Normal(dist)
            }
        };
        Ok(Self { prepared })
    }

    /// Draws one service time in milliseconds. Never negative.
    pub fn sample_ms(&self, rng: &mut SimRng) -> f64 {
        match &self.prepared {
            PreparedLatency::LogNormalShifted {
                min_ms,
                scale_ms,
                dist,
            } => min_ms + rng.sample(dist) * scale_ms,
            PreparedLatency::Normal(dist) => rng.sample(dist).max(0.0),
        }
    }
}

/// Outcome of asking a resource for a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// A slot was free; service starts immediately and takes
    /// `service_ms`.
    Granted { service_ms: f64 },
    /// All slots busy; the request joined the waiter queue under
    /// `ticket` and will be abandoned after `timeout_ms` unless a slot
    /// is granted first.
    Queued { ticket: Ticket, timeout_ms: f64 },
}

#[derive(Debug)]
struct Waiter {
    request: RequestId,
    ticket: Ticket,
}

/// A storage tier's admission gate: bounded slots plus a FIFO queue.
#[derive(Debug)]
pub struct ServiceResource {
    capacity: usize,
    in_use: usize,
    admission_timeout_ms: f64,
    sampler: ServiceTimeSampler,
    waiters: VecDeque<Waiter>,
    next_ticket: Ticket,
}

impl ServiceResource {
    pub fn new(
        capacity: usize,
        admission_timeout_ms: f64,
        sampler: ServiceTimeSampler,
    ) -> Self {
        Self {
            capacity,
            in_use: 0,
            admission_timeout_ms,
            sampler,
            waiters: VecDeque::new(),
            next_ticket: 0,
        }
    }

    /// Requests a slot for `request`.
    ///
    /// Grants immediately when a slot is free, otherwise queues the
    /// request and returns the ticket its timeout must carry.
    pub fn admit(&mut self, request: RequestId, rng: &mut SimRng) -> Admission {
        if self.in_use < self.capacity {
            self.in_use += 1;
            Admission::Granted {
                service_ms: self.sampler.sample_ms(rng),
            }
        } else {
            let ticket = self.next_ticket;
            self.next_ticket += 1;
            self.waiters.push_back(Waiter { request, ticket });
            Admission::Queued {
                ticket,
                timeout_ms: self.admission_timeout_ms,
            }
        }
    }

    /// Removes the waiter holding `ticket`, if it is still queued.
    ///
    /// Returns false when the ticket is stale: the waiter was already
    /// granted a slot and its timeout must be ignored.
    pub fn cancel(&mut self, ticket: Ticket) -> bool {
        if let Some(pos) = self.waiters.iter().position(|w| w.ticket == ticket) {
            self.waiters.remove(pos);
            true
        } else {
            false
        }
    }

    /// Releases one slot and hands it to the waiter at the front of the
    /// queue, if any.
    ///
    /// Returns the granted request and its freshly drawn service time.
    /// The slot count is unchanged when a waiter takes over; the slot
    /// only becomes free when the queue is empty.
    pub fn release(&mut self, rng: &mut SimRng) -> Option<(RequestId, f64)> {
        debug_assert!(self.in_use > 0, "release without a held slot");
        match self.waiters.pop_front() {
            Some(waiter) => {
                let service_ms = self.sampler.sample_ms(rng);
                Some((waiter.request, service_ms))
            }
            None => {
                self.in_use -= 1;
                None
            }
        }
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Requests queued for admission.
    pub fn queued(&self) -> usize {
        self.waiters.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
