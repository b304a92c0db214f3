//! Incremental synchronization of a remote tree.
//!
//! [`apply`] is the pure transformation of one snapshot by one change event.
//! [`SyncSession`] owns the current snapshot of a stream, serializes every
//! inbound [`Message`] through it and publishes each new snapshot.

mod applier;
mod event;
mod message;
mod session;

pub use applier::apply;
pub use event::{ChangeAction, ChangeEvent};
pub use message::{MalformedMessageError, Message};
pub use session::{SessionError, Subscription, SyncError, SyncSession, Transition};
