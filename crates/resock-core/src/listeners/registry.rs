//! Listener registry
//!
//! Each event kind owns an ordered list of callbacks. Invocation follows
//! registration order, and a callback that errors or panics is isolated: the
//! failure is logged and reported back, and the remaining callbacks still run.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::events::{EventKind, SocketEvent};

/// Error type a fallible listener may return
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Callback = dyn Fn(&SocketEvent) -> Result<(), BoxError> + Send + Sync;

/// Handle to a user callback
///
/// Handles are cheap to clone. Two handles are equal when they point at the
/// same callback allocation, which is what `remove` matches on.
#[derive(Clone)]
pub struct Listener(Arc<Callback>);

impl Listener {
    /// Wrap an infallible callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(move |event| {
            callback(event);
            Ok(())
        }))
    }

    /// Wrap a callback that may fail
    pub fn fallible<F, E>(callback: F) -> Self
    where
        F: Fn(&SocketEvent) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self(Arc::new(move |event| callback(event).map_err(Into::into)))
    }

    /// Check whether both handles refer to the same callback
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0).cast::<()>(),
            Arc::as_ptr(&other.0).cast::<()>(),
        )
    }

    fn call(&self, event: &SocketEvent) -> Result<(), String> {
        match catch_unwind(AssertUnwindSafe(|| (self.0)(event))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic_message(panic.as_ref())),
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

/// A listener that failed during one invocation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Event kind being dispatched
    pub kind: EventKind,
    /// Position of the listener in its list
    pub index: usize,
    /// Error or panic message
    pub message: String,
}

/// Initial listeners, keyed by event kind
#[derive(Debug, Clone, Default)]
pub struct ListenerTable {
    pub open: Vec<Listener>,
    pub message: Vec<Listener>,
    pub close: Vec<Listener>,
    pub error: Vec<Listener>,
}

impl ListenerTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `kind`
    #[must_use]
    pub fn on(mut self, kind: EventKind, listener: Listener) -> Self {
        self.list_mut(kind).push(listener);
        self
    }

    /// Listeners registered for `kind`
    #[must_use]
    pub fn list(&self, kind: EventKind) -> &[Listener] {
        match kind {
            EventKind::Open => &self.open,
            EventKind::Message => &self.message,
            EventKind::Close => &self.close,
            EventKind::Error => &self.error,
        }
    }

    fn list_mut(&mut self, kind: EventKind) -> &mut Vec<Listener> {
        match kind {
            EventKind::Open => &mut self.open,
            EventKind::Message => &mut self.message,
            EventKind::Close => &mut self.close,
            EventKind::Error => &mut self.error,
        }
    }
}

/// Ordered callbacks per event kind
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    table: ListenerTable,
}

impl ListenerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener; duplicates are kept
    pub fn add(&mut self, kind: EventKind, listener: Listener) {
        self.table.list_mut(kind).push(listener);
        tracing::trace!(kind = %kind, count = self.len(kind), "Listener added");
    }

    /// Remove the first listener equal to `listener`
    ///
    /// Returns whether a listener was removed.
    pub fn remove(&mut self, kind: EventKind, listener: &Listener) -> bool {
        let list = self.table.list_mut(kind);
        match list.iter().position(|l| l == listener) {
            Some(index) => {
                list.remove(index);
                tracing::trace!(kind = %kind, index = index, "Listener removed");
                true
            }
            None => false,
        }
    }

    /// Remove every listener for `kind`
    pub fn clear(&mut self, kind: EventKind) {
        self.table.list_mut(kind).clear();
    }

    /// Number of listeners for `kind`
    #[must_use]
    pub fn len(&self, kind: EventKind) -> usize {
        self.table.list(kind).len()
    }

    /// Check whether no listener is registered for any kind
    #[must_use]
    pub fn is_empty(&self) -> bool {
        EventKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }

    /// Copy of the listener list for `kind`
    ///
    /// Dispatching from a snapshot lets callbacks modify the registry while
    /// the pass is running.
    #[must_use]
    pub fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.table.list(kind).to_vec()
    }

    /// Invoke every listener registered for the event's kind
    pub fn invoke(&self, event: &SocketEvent) -> Vec<ListenerFailure> {
        invoke_all(self.table.list(event.kind()), event)
    }
}

impl From<ListenerTable> for ListenerRegistry {
    fn from(table: ListenerTable) -> Self {
        Self { table }
    }
}

/// Invoke `listeners` in order, isolating failures
pub fn invoke_all(listeners: &[Listener], event: &SocketEvent) -> Vec<ListenerFailure> {
    let kind = event.kind();
    let mut failures = Vec::new();

    for (index, listener) in listeners.iter().enumerate() {
        if let Err(message) = listener.call(event) {
            tracing::warn!(
                kind = %kind,
                index = index,
                error = %message,
                "Listener failed"
            );
            failures.push(ListenerFailure {
                kind,
                index,
                message,
            });
        }
    }

    failures
}
