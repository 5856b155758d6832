//! # CodeReason Shared Library
//!
//! Domain types and business rules shared by the CodeReason API server and
//! the maintenance worker.
//!
//! ## Module Organization
//!
//! - `auth`: Identity token validation and role checks
//! - `db`: Connection pool and migrations
//! - `models`: Database rows and their queries
//! - `quota`: Tier limits and usage accounting
//! - `trial`: Trial lifecycle and lazy expiry

pub mod auth;
pub mod db;
pub mod models;
pub mod quota;
pub mod trial;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
