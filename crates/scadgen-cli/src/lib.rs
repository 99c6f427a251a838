//! scadgen CLI library.
//!
//! This crate provides the orchestration side of scadgen: configuration
//! resolution, format dispatch, the bounded-concurrency generation pipeline,
//! post-processing of rendered artifacts and 3MF package enhancement.

pub mod archive;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod pipeline;
pub mod postprocess;
pub mod report;
