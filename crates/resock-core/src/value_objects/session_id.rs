//! Transport session identifier

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one transport session
///
/// Every connection attempt gets a fresh id, so notifications that arrive from
/// a session that has since been replaced can be told apart from live ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
