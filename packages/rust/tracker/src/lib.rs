//! Client for the incident tracking service.
//!
//! This crate provides:
//! - [`TrackerClient`]: authenticated REST calls, including full pagination
//! - [`TokenProvider`]: cached bearer tokens with a single-flight refresh

pub mod auth;
pub mod client;

pub use auth::{Credentials, TokenProvider};
pub use client::{
    DEFAULT_INCIDENT_PAGE_SIZE, EVENT_PAGE_SIZE, Query, TrackerClient, build_http_client,
};
