//! Reduces an incident and its event log to the fields a summarizer needs.
//!
//! - [`record`]: field whitelisting for incidents and events
//! - [`note`]: note scrubbing (code blocks, vendor URLs, link markup)

pub mod note;
pub mod record;

pub use note::{CODE_BLOCK_PLACEHOLDER, VENDOR_URL_PLACEHOLDER, clean_note};
pub use record::{SanitizedEvent, SanitizedIncident, sanitize_event, sanitize_incident};
