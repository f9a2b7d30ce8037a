//! Socket settings and validation

mod socket_settings;

pub use socket_settings::{ConfigError, SocketSettings, ValidatedSettings};
