//! Timing harness for the sample pipeline.
//!
//! For every warehouse size and repeat the pipeline runs twice against the
//! same database file: once on an empty file, once on top of the first run.
//! The minimum over the repeats is reported per phase.

use std::path::{Path, PathBuf};
use std::time::Instant;

use provtrail_core::{Provenance, SqliteStore};
use serde::Serialize;
use tracing::{debug, info};

use crate::sample;

/// One result line.
#[derive(Debug, Clone, Serialize)]
pub struct BenchRecord {
    #[serde(rename = "type")]
    pub phase: &'static str,
    pub size: usize,
    pub db_file_size: u64,
    pub duration_per_element: f64,
    pub duration_per_record: f64,
    pub min_duration: f64,
    pub mean_duration: f64,
    pub all_results: Vec<f64>,
}

#[derive(Default)]
struct Samples {
    durations: Vec<f64>,
    file_sizes: Vec<u64>,
}

impl Samples {
    fn record(&self, phase: &'static str, size: usize) -> BenchRecord {
        let min_duration = self.durations.iter().copied().fold(f64::INFINITY, f64::min);
        let mean_duration = self.durations.iter().sum::<f64>() / self.durations.len() as f64;
        let duration_per_record = min_duration / size as f64;
        BenchRecord {
            phase,
            size,
            db_file_size: self.file_sizes.iter().copied().min().unwrap_or(0),
            duration_per_element: duration_per_record / sample::ELEMENTS_PER_ROW as f64,
            duration_per_record,
            min_duration,
            mean_duration,
            all_results: self.durations.clone(),
        }
    }
}

fn run_pipeline(path: &Path, rows: usize) -> anyhow::Result<f64> {
    let started = Instant::now();
    let mut prov = Provenance::new(SqliteStore::open(path)?);
    sample::register(&mut prov)?;
    sample::record_rows(&mut prov, rows)?;
    prov.close()?;
    Ok(started.elapsed().as_secs_f64())
}

fn remove_database(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(file));
    }
}

/// Measure every size in `sizes`, `repeat` times each, with databases
/// created in `dir`.
pub fn run(
    sizes: &[usize],
    repeat: usize,
    keep: bool,
    dir: &Path,
) -> anyhow::Result<Vec<BenchRecord>> {
    if repeat == 0 {
        anyhow::bail!("repeat must be at least 1");
    }
    if sizes.contains(&0) {
        anyhow::bail!("warehouse sizes must be at least 1");
    }

    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let mut empty_runs = Vec::with_capacity(sizes.len());
    let mut update_runs = Vec::with_capacity(sizes.len());

    for &size in sizes {
        let mut empty = Samples::default();
        let mut update = Samples::default();
        for r in 0..repeat {
            let path = dir.join(format!("provtrail_bench_{stamp}_{size}_{r}.db"));
            remove_database(&path);

            empty.durations.push(run_pipeline(&path, size)?);
            empty.file_sizes.push(std::fs::metadata(&path)?.len());
            update.durations.push(run_pipeline(&path, size)?);
            update.file_sizes.push(std::fs::metadata(&path)?.len());
            debug!(size, repeat = r, path = %path.display(), "bench run finished");

            if !keep {
                remove_database(&path);
            }
        }
        info!(size, "bench size finished");
        empty_runs.push(empty.record("emptydb", size));
        update_runs.push(update.record("updatedb", size));
    }

    empty_runs.extend(update_runs);
    Ok(empty_runs)
}
