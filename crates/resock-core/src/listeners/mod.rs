//! Listener registry - ordered user callbacks per event kind

mod registry;

pub use registry::{
    invoke_all, BoxError, Listener, ListenerFailure, ListenerRegistry, ListenerTable,
};
