//! Event routing: dispatch session events to handlers registered per type.
//!
//! The [`Dispatcher`] maps [`EventTag`] values to an ordered list of
//! [`EventHandler`]s. Handlers run on the session's receive task in
//! registration order. A handler that panics is isolated: the remaining
//! handlers still run, and the panic is reported as a [`SessionEvent::Error`].

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::messages::{ChatMessage, Connected, MatchFound, StateUpdate};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Unique tag identifying an event type, used as the key for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    /// Server assigned a player id.
    Connected,
    /// Matchmaking completed.
    MatchFound,
    /// Chat message relayed by the server.
    ChatMessage,
    /// Authoritative world snapshot.
    StateUpdate,
    /// Heartbeat reply.
    Pong,
    /// Session ended.
    Disconnected,
    /// Transport, protocol or handler failure.
    Error,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The application called `disconnect`.
    Requested,
    /// The server closed the connection.
    RemoteClosed,
    /// The transport failed.
    TransportFailed(String),
}

/// A non-fatal failure surfaced to the application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionFault {
    /// The transport failed to connect, send or receive.
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound frame could not be decoded and was dropped.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An application handler panicked.
    #[error("handler for {tag:?} panicked: {message}")]
    Handler {
        /// Event type the handler was registered for.
        tag: EventTag,
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// Events delivered to application handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Server assigned a player id.
    Connected(Connected),
    /// Matchmaking completed.
    MatchFound(MatchFound),
    /// Chat message relayed by the server.
    ChatMessage(ChatMessage),
    /// Authoritative world snapshot.
    StateUpdate(StateUpdate),
    /// Heartbeat reply. `latency_ms` is `None` when no ping was outstanding.
    Pong {
        /// Round-trip time of the matching ping.
        latency_ms: Option<u64>,
    },
    /// Session ended. Delivered exactly once per established session.
    Disconnected {
        /// Why the session ended.
        reason: DisconnectReason,
    },
    /// Something went wrong. The session may or may not still be up.
    Error(SessionFault),
}

impl SessionEvent {
    /// Routing tag of this event.
    pub fn tag(&self) -> EventTag {
        match self {
            SessionEvent::Connected(_) => EventTag::Connected,
            SessionEvent::MatchFound(_) => EventTag::MatchFound,
            SessionEvent::ChatMessage(_) => EventTag::ChatMessage,
            SessionEvent::StateUpdate(_) => EventTag::StateUpdate,
            SessionEvent::Pong { .. } => EventTag::Pong,
            SessionEvent::Disconnected { .. } => EventTag::Disconnected,
            SessionEvent::Error(_) => EventTag::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Trait for event handlers. Usually a closure.
pub trait EventHandler: Send + Sync {
    /// Process a single event.
    fn handle(&self, event: &SessionEvent);
}

/// Blanket implementation for closures.
impl<F> EventHandler for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn handle(&self, event: &SessionEvent) {
        self(event);
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

type HandlerList = Vec<Arc<dyn EventHandler>>;

/// Routes events to every handler registered for their [`EventTag`].
#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<HashMap<EventTag, HandlerList>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event type. Handlers for the same type run
    /// in registration order.
    pub fn register<H: EventHandler + 'static>(&self, tag: EventTag, handler: H) {
        self.handlers
            .lock()
            .entry(tag)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Number of handlers registered for `tag`.
    pub fn handler_count(&self, tag: EventTag) -> usize {
        self.handlers.lock().get(&tag).map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler registered for its tag.
    ///
    /// Handlers may register further handlers; those take effect from the
    /// next dispatch. Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &SessionEvent) -> usize {
        let tag = event.tag();
        let snapshot: HandlerList = match self.handlers.lock().get(&tag) {
            Some(list) => list.clone(),
            None => {
                tracing::trace!(?tag, "no handler registered, dropping event");
                return 0;
            }
        };

        for handler in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(event)));
            if let Err(payload) = outcome {
                let message = panic_message(payload.as_ref());
                tracing::error!(?tag, %message, "event handler panicked");
                if tag != EventTag::Error {
                    self.dispatch(&SessionEvent::Error(SessionFault::Handler { tag, message }));
                }
            }
        }
        snapshot.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn pong() -> SessionEvent {
        SessionEvent::Pong {
            latency_ms: Some(12),
        }
    }

    #[test]
    fn test_event_routed_to_matching_tag_only() {
        let pongs = Arc::new(AtomicU32::new(0));
        let chats = Arc::new(AtomicU32::new(0));

        let dispatcher = Dispatcher::new();
        let p = Arc::clone(&pongs);
        dispatcher.register(EventTag::Pong, move |_: &SessionEvent| {
            p.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&chats);
        dispatcher.register(EventTag::ChatMessage, move |_: &SessionEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.dispatch(&pong()), 1);
        assert_eq!(pongs.load(Ordering::SeqCst), 1);
        assert_eq!(chats.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.register(EventTag::Pong, move |_: &SessionEvent| {
                order.lock().push(i);
            });
        }

        dispatcher.dispatch(&pong());
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(dispatcher.handler_count(EventTag::Pong), 3);
    }

    #[test]
    fn test_unhandled_event_is_dropped() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.dispatch(&pong()), 0);
        assert_eq!(dispatcher.handler_count(EventTag::Pong), 0);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let later = Arc::new(AtomicU32::new(0));
        let faults = Arc::new(Mutex::new(Vec::new()));

        let dispatcher = Dispatcher::new();
        dispatcher.register(EventTag::Pong, |_: &SessionEvent| panic!("boom"));
        let l = Arc::clone(&later);
        dispatcher.register(EventTag::Pong, move |_: &SessionEvent| {
            l.fetch_add(1, Ordering::SeqCst);
        });
        let f = Arc::clone(&faults);
        dispatcher.register(EventTag::Error, move |event: &SessionEvent| {
            f.lock().push(event.clone());
        });

        assert_eq!(dispatcher.dispatch(&pong()), 2);
        assert_eq!(later.load(Ordering::SeqCst), 1);

        let faults = faults.lock();
        assert_eq!(faults.len(), 1);
        assert_eq!(
            faults[0],
            SessionEvent::Error(SessionFault::Handler {
                tag: EventTag::Pong,
                message: "boom".to_string(),
            })
        );
    }

    #[test]
    fn test_panicking_error_handler_does_not_recurse() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(EventTag::Error, |_: &SessionEvent| panic!("again"));
        let event = SessionEvent::Error(SessionFault::Protocol("bad".to_string()));
        assert_eq!(dispatcher.dispatch(&event), 1);
    }

    #[test]
    fn test_handler_may_register_during_dispatch() {
        let dispatcher = Arc::new(Dispatcher::new());
        let inner = Arc::clone(&dispatcher);
        dispatcher.register(EventTag::Pong, move |_: &SessionEvent| {
            inner.register(EventTag::Pong, |_: &SessionEvent| {});
        });

        assert_eq!(dispatcher.dispatch(&pong()), 1);
        assert_eq!(dispatcher.handler_count(EventTag::Pong), 2);
    }

    #[test]
    fn test_event_tags() {
        assert_eq!(pong().tag(), EventTag::Pong);
        let disconnected = SessionEvent::Disconnected {
            reason: DisconnectReason::Requested,
        };
        assert_eq!(disconnected.tag(), EventTag::Disconnected);
    }
}
