//! # CodeReason API Server Library
//!
//! HTTP layer of the CodeReason platform: organizations, workspaces,
//! repositories and analyses, plus the account features around them (trials,
//! usage limits, invitations, referrals, notifications).
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Json, Query and Path extractors that reject with `ApiError`
//! - `middleware`: Rate limiting and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
