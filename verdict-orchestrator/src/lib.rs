//! Verdict Orchestrator
//!
//! Queues test jobs, hands them to long-polling runners, tracks their
//! lifecycle and imports the test results runners upload.

pub mod api;
pub mod auth;
pub mod codec;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod events;
pub mod ingest;
pub mod keyed_lock;
pub mod repository;
pub mod service;
pub mod state;
