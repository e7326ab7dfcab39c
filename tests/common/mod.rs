//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - A scriptable remote API with failure injection
//! - Capture fixtures and store constructors
//! - Custom assertion macros

pub mod assertions;
pub mod fake_remote;
pub mod fixtures;

// Re-export commonly used utilities
pub use fake_remote::*;
pub use fixtures::*;
