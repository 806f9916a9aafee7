//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Engine and database fixtures
//! - Mock HTTP endpoints
//! - Platform fakes
//! - Custom assertion macros

pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
pub use mock_server::*;
pub use platform::*;
