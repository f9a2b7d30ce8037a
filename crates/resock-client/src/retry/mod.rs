//! Reconnection timer

mod controller;

pub use controller::{RetryController, TimerToken};
