//! Byte sources turned into streams of text frames for a [`SyncSession`](crate::sync::SyncSession).

mod frames;

pub use frames::{TransportError, connect, line_frames, read_recording};
