//! Shared helpers for the integration tests.

#![allow(dead_code)]

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
