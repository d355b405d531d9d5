//! Shared test utilities for docintel integration tests.
//!
//! - `TestHarness` wires a full service (storage, ledger, pipeline, workers,
//!   dispatch front) over a temp directory
//! - Fake collaborators for the failure paths

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
