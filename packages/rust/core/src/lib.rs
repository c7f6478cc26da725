//! Incident selection and summarization workflows.
//!
//! This crate ties the tracker client, the sanitizer, the summarization
//! backend and Markdown normalization into end-to-end flows: one incident
//! at a time ([`SummaryPipeline`]) or the periodic worker ([`run_worker`]).

pub mod batch;
pub mod llm;
pub mod pipeline;
pub mod staleness;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use batch::{BatchReport, BatchRunner, IncidentOutcome, Outcome};
pub use llm::{
    OpenAiChatBackend, POLL_INTERVAL, SilentProgress, SummaryBackend, SummaryHandle,
    SummaryProgress, SummaryWriter, summary_channel,
};
pub use pipeline::{DEFAULT_SUMMARY_TIMEOUT, SummaryPipeline, load_prompt};
pub use staleness::{Staleness, evaluate, select_stale, window_start};
pub use worker::{WorkerOptions, run_worker};
