//! # CodeReason Worker Library
//!
//! Background maintenance for the CodeReason platform.
//!
//! ## Modules
//!
//! - `config`: Environment configuration
//! - `jobs`: Maintenance jobs (trial expiry, invitation cleanup)
//! - `sweeper`: Periodic loop running the jobs until shutdown

pub mod config;
pub mod jobs;
pub mod sweeper;
