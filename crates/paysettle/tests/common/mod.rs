//! Shared test utilities for paysettle integration tests.
//!
//! This module provides:
//! - `TestHarness` with a temp directory, an on-disk database and a manual clock
//! - Test doubles for the rate provider, notifier and mailer
//! - Builders for CSV content and rate tables

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
