//! Feature Triage
//!
//! Backend for collaborative MoSCoW feature prioritization. The core of the
//! crate is [`services::queue`]: an in-memory job queue that serializes
//! AI-assisted analysis of tracker features through a local Ollama endpoint,
//! reporting per-item progress while callers poll for a terminal status.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
