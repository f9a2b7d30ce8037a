//! Integration test utilities for resock
//!
//! This crate provides a mock WebSocket server and listener recorders for
//! end-to-end tests of the reconnecting client.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
