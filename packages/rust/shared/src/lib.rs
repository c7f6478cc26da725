//! Shared types, error model, and configuration for the incident summarizer.
//!
//! This crate is the foundation depended on by all other summarizer crates.
//! It provides:
//! - [`SummarizerError`]: the unified error type
//! - Domain types ([`Incident`], [`Event`], [`IncidentStatus`], [`Page`])
//! - Configuration ([`AppConfig`], config loading and env overrides)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, LoggingConfig, SsoConfig, TrackerConfig, WorkerConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_config,
};
pub use error::{Result, SummarizerError};
pub use types::{Event, EventCreator, EventType, FollowUp, Incident, IncidentStatus, Page, Person};
