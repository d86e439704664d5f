//! Pipeline events: the envelope, the closed set of event types, typed payloads
//! and the listener seam the dispatcher fans out to.

pub mod envelope;
pub mod event_type;
pub mod listener;
pub mod payload;

pub use envelope::{Event, EventError, SPEC_VERSION};
pub use event_type::EventType;
pub use listener::{Listener, ListenerError, handler_signature};
pub use payload::*;
