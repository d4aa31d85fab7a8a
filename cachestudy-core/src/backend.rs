//! Per-request orchestration.
//!
//! Each client request walks a small state machine: read the cache,
//! fall back to the database on a miss, write the result back, and
//! occasionally piggyback a TTL extension on a hit. The machine is
//! pure; the engine feeds it operation results and executes the steps
//! it returns.

use crate::clock::{SimRng, SimTime};
use crate::resource::Target;
use crate::stats::Outcome;
use crate::store::{Key, RemainingTtl, TtlStore};

/// Identifies one in-flight request.
pub type RequestId = u64;

/// Where a request currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Initial cache lookup.
    CacheRead,
    /// Refreshing a still-live entry's backing value after a hit.
    TtlExtendDbRead,
    /// Rewriting the refreshed value into the cache.
    TtlExtendCacheWrite,
    /// Authoritative read after a cache miss.
    DbRead,
    /// Populating the cache with the database's answer.
    CacheWriteBack,
}

impl Phase {
    /// The tier this phase's operation runs against.
    pub fn target(self) -> Target {
        match self {
            Phase::CacheRead | Phase::TtlExtendCacheWrite | Phase::CacheWriteBack => {
                Target::Cache
            }
            Phase::TtlExtendDbRead | Phase::DbRead => Target::Database,
        }
    }

    /// Whether this phase's operation writes rather than reads.
    pub fn is_write(self) -> bool {
        matches!(self, Phase::TtlExtendCacheWrite | Phase::CacheWriteBack)
    }
}

/// State carried by one in-flight request.
#[derive(Debug)]
pub(crate) struct RequestTask {
    pub key: Key,
    pub arrived_at: SimTime,
    pub phase: Phase,
    /// Value fetched from the database, awaiting a cache write.
    pub pending_value: Option<String>,
}

impl RequestTask {
    pub fn new(key: Key, arrived_at: SimTime) -> Self {
        Self {
            key,
            arrived_at,
            phase: Phase::CacheRead,
            pending_value: None,
        }
    }
}

/// What the current phase's operation produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OpResult {
    /// A read completed; `None` means the key was absent or expired.
    Value(Option<String>),
    /// A write completed.
    Wrote,
    /// Admission to the tier timed out; the operation never ran.
    TimedOut,
}

/// What the engine should do next for this request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    /// Start the operation for the task's (updated) phase; the tier is
    /// the phase's [`Phase::target`].
    StartOp,
    /// The request is done; record it with `outcome`.
    Finish { outcome: Outcome },
}

/// Advances a request's state machine by one operation result.
///
/// `cache` is consulted read-only to decide whether a TTL extension is
/// worthwhile; all mutation happens in the engine when it executes the
/// returned step.
pub(crate) fn advance(
    task: &mut RequestTask,
    result: OpResult,
    cache: &TtlStore,
    now: SimTime,
    ttl_extension_probability: f64,
    rng: &mut SimRng,
) -> Step {
    match (task.phase, result) {
        // Cache admission timed out: the request gives up entirely.
        (Phase::CacheRead, OpResult::TimedOut) => Step::Finish {
            outcome: Outcome::CacheFail,
        },

        (Phase::CacheRead, OpResult::Value(Some(_))) => {
            if rng.random_bool(ttl_extension_probability) {
                // Only refresh entries that are still live; a key that
                // expired between the read and this check keeps the
                // extension tag but skips the refresh.
                if let RemainingTtl::Remaining(_) = cache.remaining_ttl(task.key, now) {
                    task.phase = Phase::TtlExtendDbRead;
                    Step::StartOp
                } else {
                    Step::Finish {
                        outcome: Outcome::CacheHitTtlExt,
                    }
                }
            } else {
                Step::Finish {
                    outcome: Outcome::CacheHit,
                }
            }
        }

        (Phase::CacheRead, OpResult::Value(None)) => {
            task.phase = Phase::DbRead;
            Step::StartOp
        }

        // The extension is best-effort: a database timeout or an absent
        // backing row just ends the request as a served hit.
        (Phase::TtlExtendDbRead, OpResult::TimedOut)
        | (Phase::TtlExtendDbRead, OpResult::Value(None)) => Step::Finish {
            outcome: Outcome::CacheHitTtlExt,
        },

        (Phase::TtlExtendDbRead, OpResult::Value(Some(value))) => {
            task.pending_value = Some(value);
            task.phase = Phase::TtlExtendCacheWrite;
            Step::StartOp
        }

        (Phase::TtlExtendCacheWrite, _) => Step::Finish {
            outcome: Outcome::CacheHitTtlExt,
        },

        (Phase::DbRead, OpResult::TimedOut) => Step::Finish {
            outcome: Outcome::CacheMissDbFail,
        },

        (Phase::DbRead, OpResult::Value(Some(value))) => {
            task.pending_value = Some(value);
            task.phase = Phase::CacheWriteBack;
            Step::StartOp
        }

        // The database has no row for this key. Nothing to cache; the
        // client still got an authoritative answer.
        (Phase::DbRead, OpResult::Value(None)) => Step::Finish {
            outcome: Outcome::CacheMissDbOk,
        },

        // The write-back is best-effort too: the client already has the
        // value, a cache write timeout just leaves the key cold.
        (Phase::CacheWriteBack, _) => Step::Finish {
            outcome: Outcome::CacheMissDbOk,
        },

        (phase, result) => {
            unreachable!("no transition from {phase:?} on {result:?}")
        }
    }
}
