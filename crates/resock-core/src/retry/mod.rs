//! Retry policy - how long to wait before each reconnection attempt

mod policy;

pub use policy::{Backoff, RetryPolicy, DEFAULT_RETRY_DELAY};
