//! Bounded-parallel execution of per-incident jobs with failure isolation.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use summarizer_shared::{Incident, Result, SummarizerError};

/// How one incident's job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(String),
}

/// How one incident's job ended, with the id it is shown under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentOutcome {
    pub public_id: String,
    pub outcome: Outcome,
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Jobs dispatched.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Keyed by internal incident id, the same key duplicates are dropped by.
    pub outcomes: BTreeMap<String, IncidentOutcome>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, id: String, public_id: String, outcome: Outcome) {
        match outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
        self.outcomes.insert(id, IncidentOutcome { public_id, outcome });
    }
}

/// Runs one job per incident with at most `concurrency` active at once.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    concurrency: usize,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(1)
    }
}

impl BatchRunner {
    /// `concurrency` is clamped to at least 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Dispatch `job` for every incident and wait for all of them.
    ///
    /// A job that errors or panics is logged and counted as failed; it never
    /// affects the other jobs. Incidents repeating an internal id already
    /// dispatched are skipped.
    pub async fn run<F, Fut>(&self, incidents: Vec<Incident>, job: F) -> BatchReport
    where
        F: Fn(Incident) -> Fut,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut seen: HashSet<String> = HashSet::new();
        let mut handles: Vec<(String, String, JoinHandle<Result<String>>)> = Vec::new();

        info!(
            incidents = incidents.len(),
            concurrency = self.concurrency,
            "starting batch"
        );

        for incident in incidents {
            if !seen.insert(incident.id.clone()) {
                warn!(
                    public_id = %incident.incident_id,
                    id = %incident.id,
                    "duplicate incident in work list, skipping"
                );
                continue;
            }

            let id = incident.id.clone();
            let public_id = incident.incident_id.clone();
            let span = info_span!("incident", public_id = %public_id);
            let sem = semaphore.clone();
            let work = job(incident);

            let handle = tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await.map_err(|_| {
                        SummarizerError::Summarization("worker pool closed".into())
                    })?;
                    work.await
                }
                .instrument(span),
            );
            handles.push((id, public_id, handle));
        }

        let mut report = BatchReport {
            total: handles.len(),
            ..BatchReport::default()
        };

        for (id, public_id, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(_)) => Outcome::Succeeded,
                Ok(Err(e)) => {
                    error!(%public_id, error = %e, "incident failed");
                    Outcome::Failed(e.to_string())
                }
                Err(e) => {
                    error!(%public_id, error = %e, "incident task panicked");
                    Outcome::Failed(format!("task failed: {e}"))
                }
            };
            report.record(id, public_id, outcome);
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "batch completed"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
