//! Shared test utilities for contractflow integration tests.
//!
//! This module provides:
//! - `TestHarness` with a temp directory, seeded database and engine
//! - Builders for directory records, job requests and fixture PDFs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
