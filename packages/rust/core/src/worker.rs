//! The periodic worker flow: list, select stale, summarize in parallel.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use summarizer_shared::{IncidentStatus, Result};

use crate::batch::{BatchReport, BatchRunner};
use crate::pipeline::SummaryPipeline;
use crate::staleness::select_stale;

/// Knobs for one worker run.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Incident statuses to consider; empty means all.
    pub statuses: Vec<IncidentStatus>,
    /// Only consider incidents changed within this many days. `None` or 0
    /// means no limit.
    pub max_days_since_update: Option<u32>,
    pub max_workers: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            statuses: IncidentStatus::ALL.to_vec(),
            max_days_since_update: None,
            max_workers: 1,
        }
    }
}

/// Summarize and write back every incident whose AI summary is stale.
///
/// Listing and selection errors abort the run. Per-incident failures only
/// show up in the returned report.
#[instrument(skip_all, fields(max_workers = options.max_workers))]
pub async fn run_worker(
    pipeline: &SummaryPipeline,
    options: &WorkerOptions,
    now: DateTime<Utc>,
) -> Result<BatchReport> {
    let client = pipeline.client();

    let incidents = client.list_incidents(&options.statuses).await?;
    let stale = select_stale(client, incidents, options.max_days_since_update, now).await?;

    info!(stale = stale.len(), "incidents selected for summarization");

    let report = BatchRunner::new(options.max_workers)
        .run(stale, |incident| {
            let pipeline = pipeline.clone();
            async move { pipeline.summarize_and_update(&incident).await }
        })
        .await;

    info!(
        total = report.total,
        errors = report.failed,
        successes = report.succeeded,
        "worker finished"
    );

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
