//! # recordb Testkit
//!
//! Test utilities for recordb.
//!
//! This crate provides:
//! - Record fixtures (users, posts, profiles, slugs) and their database
//!   configuration
//! - Test databases backed by every bundled plugin
//! - A connection conformance suite every backend must pass
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use recordb_testkit::prelude::*;
//!
//! with_memory_db(|context| {
//!     let users = scenarios::seed_users(context);
//!     assert_eq!(users.len(), 3);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;

use std::sync::Once;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use fixtures::*;
pub use generators::*;

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
