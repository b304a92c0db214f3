//! Request/response services the producer exposes next to its stream.
//!
//! Only the contracts matter to the sync engine. `watch-check` drives the
//! local watch registry; the history service is library surface for
//! embedders, since the line protocol carries no file contents.

mod history;
mod watch_registry;

pub use history::{FileVersion, HistoryError, HistoryLookup, LocalHistory};
pub use watch_registry::{LocalWatchRegistry, WatchRegistry, WatchRegistryError};
