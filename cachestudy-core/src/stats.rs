//! Run statistics: terminal outcome counters and per-request samples.

use crate::clock::SimTime;
use crate::store::Key;

/// Terminal classification of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Served from the cache.
    CacheHit,
    /// Served from the cache, with a TTL-extension attempt piggybacked.
    CacheHitTtlExt,
    /// The cache admission queue timed out; the request gave up.
    CacheFail,
    /// Cache miss, database answered.
    CacheMissDbOk,
    /// Cache miss and the database admission queue timed out too.
    CacheMissDbFail,
}

impl Outcome {
    /// Journal tag for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::CacheHit => "cache_hit",
            Outcome::CacheHitTtlExt => "cache_hit;ttl_ext",
            Outcome::CacheFail => "cache_fail",
            Outcome::CacheMissDbOk => "cache_miss;db_ok",
            Outcome::CacheMissDbFail => "cache_miss;db_fail",
        }
    }

    /// Whether this outcome counts against `fails` rather than `ok`.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::CacheFail | Outcome::CacheMissDbFail)
    }
}

/// One completed request, as written to the journal.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Arrival time of the request.
    pub timestamp: SimTime,
    pub outcome: Outcome,
    /// Completion minus arrival, in milliseconds.
    pub latency_ms: f64,
    pub key: Key,
}

/// Accumulates counters and samples over a run.
///
/// Invariant: once the run drains, `requests == ok + fails` and every
/// completed request contributed exactly one sample.
#[derive(Debug, Default)]
pub struct StatsSink {
    requests: u64,
    ok: u64,
    fails: u64,
    samples: Vec<Sample>,
}

impl StatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one arrival into the system.
    pub fn record_arrival(&mut self) {
        self.requests += 1;
    }

    /// Records one completed request, bumping exactly one of `ok` or
    /// `fails` from its outcome.
    pub fn record(&mut self, sample: Sample) {
        if sample.outcome.is_failure() {
            self.fails += 1;
        } else {
            self.ok += 1;
        }
        self.samples.push(sample);
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn ok(&self) -> u64 {
        self.ok
    }

    pub fn fails(&self) -> u64 {
        self.fails
    }

    /// Samples in recording order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Samples sorted by arrival time, for journal export.
    ///
    /// Requests complete out of arrival order, so recording order does
    /// not guarantee non-decreasing timestamps; the export does.
    pub fn sorted_samples(&self) -> Vec<Sample> {
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        sorted
    }
}
