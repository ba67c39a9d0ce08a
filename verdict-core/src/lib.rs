//! Verdict Core
//!
//! Core types and abstractions for the Verdict test dispatch system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, Job, Runner, test results)
//! - DTOs: Data transfer objects for the runner and management boundaries
//! - Pattern sets: ordered glob lists with `!` negation, shared by the server
//!   (artifact selection) and the runner (artifact collection)

pub mod domain;
pub mod dto;
pub mod pattern;
