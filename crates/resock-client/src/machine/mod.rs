//! Connection lifecycle state machine

mod connection_machine;
mod input;

pub use connection_machine::ConnectionMachine;
pub use input::Input;
