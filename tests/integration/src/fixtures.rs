//! Test fixtures
//!
//! Listener recorders that turn socket events into comparable strings.

use std::sync::{Arc, Mutex};

use resock_client::{EventKind, Listener, ListenerTable, SocketEvent};

/// Describe an event as `kind` or `kind:detail`
pub fn describe(event: &SocketEvent) -> String {
    match event {
        SocketEvent::Open => "open".to_string(),
        SocketEvent::Message(frame) => match frame.as_text() {
            Some(text) => format!("message:{text}"),
            None => format!("message:{} bytes", frame.len()),
        },
        SocketEvent::Close(info) => match info.code {
            Some(code) => format!("close:{code}"),
            None => "close".to_string(),
        },
        SocketEvent::Error(_) => "error".to_string(),
    }
}

/// Shared, ordered record of listener calls
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listener that records `describe(event)`
    pub fn recorder(&self) -> Listener {
        let entries = self.entries.clone();
        Listener::new(move |event| entries.lock().unwrap().push(describe(event)))
    }

    /// Listener that records `name:kind`
    pub fn named(&self, name: &str) -> Listener {
        let entries = self.entries.clone();
        let name = name.to_string();
        Listener::new(move |event| {
            entries
                .lock()
                .unwrap()
                .push(format!("{name}:{}", event.kind()));
        })
    }

    /// Table with one recorder per event kind
    pub fn table(&self) -> ListenerTable {
        EventKind::ALL
            .iter()
            .fold(ListenerTable::new(), |table, kind| table.on(*kind, self.recorder()))
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of entries starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }
}
