//! CSV journal export.
//!
//! One row per completed request, preceded by `#`-prefixed header
//! lines describing the run. The body parses as plain CSV once the
//! comment lines are skipped.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};

use cachestudy_core::{RunSummary, Sample, SimulationConfig};

/// Writes the run journal to `path`, overwriting any existing file.
pub fn write_journal(
    path: &Path,
    config: &SimulationConfig,
    summary: &RunSummary,
    samples: &[Sample],
    started: DateTime<Local>,
    finished: DateTime<Local>,
) -> io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "# Simulation journal")?;
    writeln!(out, "# Start: {}", started.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "# Finish: {}", finished.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(
        out,
        "# Parameters: seed={} duration_ms={} prefill_keys={} cache_ttl_ms={} \
         ttl_extension_probability={} invalidation={:?}",
        config.run.seed,
        config.run.duration_ms,
        config.run.prefill_keys,
        config.run.key_cache_ttl_ms,
        config.run.ttl_extension_probability,
        config.run.invalidation,
    )?;
    writeln!(
        out,
        "# Workload: arrivals={:?} keys={:?}",
        config.workload.arrivals, config.workload.keys,
    )?;
    writeln!(
        out,
        "# Cache: capacity={} admission_timeout_ms={} latency={:?}",
        config.cache.capacity, config.cache.admission_timeout_ms, config.cache.latency,
    )?;
    writeln!(
        out,
        "# Database: capacity={} admission_timeout_ms={} latency={:?}",
        config.database.capacity,
        config.database.admission_timeout_ms,
        config.database.latency,
    )?;
    writeln!(out, "# Summary: {summary}")?;

    writeln!(out, "timestamp,result,response_time,key")?;
    for sample in samples {
        writeln!(
            out,
            "{:.3},{},{:.3},{}",
            sample.timestamp.as_millis(),
            sample.outcome.as_str(),
            sample.latency_ms,
            sample.key,
        )?;
    }
    out.flush()
}
