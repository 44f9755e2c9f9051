//! Integration test suite for Keel.
//!
//! Drives the chain manager, unspent set, transaction builder and archive
//! together, including hostile blocks that must leave no trace.

pub mod helpers;
