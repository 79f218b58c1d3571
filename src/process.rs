/// Batch processing: fetch and parse each run's log in parallel, bounded by a
/// semaphore, then sort the collected records for deterministic output.
///
/// Each run is independent; a fetch failure degrades that run to an empty
/// line sequence (its record still carries the listing metadata) and never
/// aborts the rest of the batch.
use crate::github::{self, RunInfo};
use crate::record::{assemble_record, ExecutionRecord};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default worker-pool bound; keeps `gh` invocations under its rate limits.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Process all runs and return their records sorted by start time descending.
pub async fn process_runs(
    runs: Vec<RunInfo>,
    repo: &str,
    parallelism: usize,
) -> Vec<ExecutionRecord> {
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut set = JoinSet::new();

    for run in runs {
        let semaphore = Arc::clone(&semaphore);
        let repo = repo.to_string();
        set.spawn(async move {
            // Closing the semaphore is not part of this design; acquire
            // only fails on close, so a failure here cannot happen.
            let _permit = semaphore.acquire().await.ok();
            process_one(run, &repo).await
        });
    }

    let mut records = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(error = %e, "worker task failed"),
        }
    }

    sort_records(&mut records);

    let usable = records
        .iter()
        .filter(|r| r.total_cost_usd.is_some())
        .count();
    tracing::info!(
        total = records.len(),
        usable,
        "processed runs ({} without usable metrics)",
        records.len() - usable
    );

    records
}

async fn process_one(run: RunInfo, repo: &str) -> ExecutionRecord {
    let run_id = run.database_id.to_string();
    tracing::info!(run_id = %run_id, run_number = run.number, "processing run");

    let lines = match github::fetch_run_log(&run_id, repo).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!(run_id = %run_id, error = %e, "failed to fetch log, emitting bare record");
            Vec::new()
        }
    };

    assemble_record(&run, &lines)
}

/// Sort by start time descending; records with no start time sort last.
/// Applied after collection so output order is independent of completion order.
fn sort_records(records: &mut [ExecutionRecord]) {
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}
