use std::io;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use derive_more::Display;
use futures::future::{self, Either};
use futures::{Stream, StreamExt};
use futures_channel::mpsc::{self, UnboundedReceiver};
use futures_channel::oneshot;
use hashlink::LinkedHashMap;
use parking_lot::{Mutex, RwLock};
use snafu::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::filesystem::{InvalidPathError, Snapshot};
use crate::sync::applier;
use crate::sync::message::{MalformedMessageError, Message};

type Observer = Arc<dyn Fn(&Snapshot) + Send + Sync>;
type ErrorObserver = Arc<dyn Fn(&SyncError) + Send + Sync>;

/// Outcome of feeding one message to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Transition {
    #[display("replaced")]
    Replaced,
    #[display("applied")]
    Applied,
    #[display("heartbeat")]
    Heartbeat,
    #[display("dropped")]
    Dropped,
    #[display("closed")]
    Closed,
}

/// Owns the authoritative snapshot of one stream and publishes every transition.
///
/// Handles are cheap to clone and all point at the same session. Reads never
/// wait on writers for longer than a pointer swap; writers are serialized so
/// each transition is computed from the snapshot published by the previous one.
#[derive(Clone)]
pub struct SyncSession {
    shared: Arc<SessionShared>,
}

struct SessionShared {
    current: RwLock<Snapshot>,
    write_gate: Mutex<()>,
    observers: Mutex<LinkedHashMap<u64, Observer>>,
    error_observers: Mutex<LinkedHashMap<u64, ErrorObserver>>,
    next_observer_id: AtomicU64,
    closed: AtomicBool,
    close_signal: Mutex<Option<oneshot::Sender<()>>>,
    close_receiver: Mutex<Option<oneshot::Receiver<()>>>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::empty())
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let (close_signal, close_receiver) = oneshot::channel();

        Self {
            shared: Arc::new(SessionShared {
                current: RwLock::new(snapshot),
                write_gate: Mutex::new(()),
                observers: Mutex::new(LinkedHashMap::new()),
                error_observers: Mutex::new(LinkedHashMap::new()),
                next_observer_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                close_signal: Mutex::new(Some(close_signal)),
                close_receiver: Mutex::new(Some(close_receiver)),
            }),
        }
    }

    /// The latest published snapshot.
    pub fn current_snapshot(&self) -> Snapshot {
        self.shared.current.read().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Registers `observer` for every published snapshot, in registration order.
    ///
    /// Observers run on the writer's thread after the snapshot is published.
    /// They may read the session or drop subscriptions, but must not feed
    /// messages back into the same session.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = self.next_observer_id();
        self.shared.observers.lock().insert(id, Arc::new(observer));
        Subscription::new(&self.shared, id, ObserverKind::Snapshot)
    }

    /// Registers `observer` for messages that were dropped.
    pub fn subscribe_errors<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&SyncError) + Send + Sync + 'static,
    {
        let id = self.next_observer_id();
        self.shared.error_observers.lock().insert(id, Arc::new(observer));
        Subscription::new(&self.shared, id, ObserverKind::Error)
    }

    /// Channel form of [`subscribe`](Self::subscribe). The receiver ends once
    /// the subscription is dropped or the session is closed.
    pub fn updates(&self) -> (Subscription, UnboundedReceiver<Snapshot>) {
        let (sender, receiver) = mpsc::unbounded();
        let subscription = self.subscribe(move |snapshot| {
            if sender.unbounded_send(snapshot.clone()).is_err() {
                trace!("Update receiver is gone");
            }
        });
        (subscription, receiver)
    }

    /// Decodes one frame and feeds it to the session. Frames that are not
    /// UTF-8 are reported and dropped like any other malformed message.
    pub fn handle_frame(&self, frame: impl AsRef<[u8]>) -> Transition {
        match Message::try_from(frame.as_ref()) {
            Ok(message) => self.handle_message(message),
            Err(source) => {
                let _gate = self.shared.write_gate.lock();
                if self.is_closed() {
                    return Transition::Closed;
                }
                self.report(SyncError::MalformedMessage { source });
                Transition::Dropped
            }
        }
    }

    /// Applies one message and publishes the resulting snapshot.
    pub fn handle_message(&self, message: Message) -> Transition {
        let _gate = self.shared.write_gate.lock();
        if self.is_closed() {
            debug!("Session closed, ignoring message");
            return Transition::Closed;
        }

        let (next, transition) = match message {
            Message::Heartbeat => {
                trace!("Heartbeat received");
                return Transition::Heartbeat;
            }
            Message::Snapshot(snapshot) => (snapshot, Transition::Replaced),
            Message::Change(event) => {
                let current = self.current_snapshot();
                match applier::apply(&current, &event) {
                    Ok(next) => (next, Transition::Applied),
                    Err(source) => {
                        self.report(SyncError::UnresolvablePath { source });
                        return Transition::Dropped;
                    }
                }
            }
        };

        *self.shared.current.write() = next.clone();
        debug!(
            "Snapshot {} ({} nodes, fingerprint {:016x})",
            transition,
            next.node_count(),
            next.fingerprint()
        );
        self.notify(&next);
        transition
    }

    /// Consumes `frames` until the session is closed or the stream stops.
    ///
    /// Returns `Ok(())` after [`close`](Self::close). An ended or failing
    /// stream is returned as an error so the owner can reconnect; the
    /// session keeps its snapshot and may be run again on a new stream,
    /// which is expected to open with a full snapshot.
    pub async fn run<S, F>(&self, frames: S) -> Result<(), SessionError>
    where
        S: Stream<Item = io::Result<F>>,
        F: AsRef<[u8]>,
    {
        let mut running = RunningGuard::acquire(&self.shared.close_receiver)?;
        let mut frames = pin!(frames);
        info!("Sync session consuming frames");

        let outcome = loop {
            if self.is_closed() {
                break Ok(());
            }
            let Some(closed) = running.closed.as_mut() else {
                break Ok(());
            };

            match future::select(closed, frames.next()).await {
                Either::Left(_) => break Ok(()),
                Either::Right((None, _)) => break StreamEndedSnafu.fail(),
                Either::Right((Some(Err(source)), _)) => {
                    break Err(SessionError::TransportError { source });
                }
                Either::Right((Some(Ok(frame)), _)) => {
                    self.handle_frame(frame);
                }
            }
        };

        match &outcome {
            Ok(()) => info!("Sync session stopped"),
            Err(error) => warn!("Sync session interrupted: {}", error),
        }
        outcome
    }

    /// Stops the session. A running [`run`](Self::run) returns promptly and
    /// drops its stream; later messages are ignored and observers released.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(signal) = self.shared.close_signal.lock().take() {
            let _ = signal.send(());
        }
        self.shared.observers.lock().clear();
        self.shared.error_observers.lock().clear();
        info!("Sync session closed");
    }

    fn next_observer_id(&self) -> u64 {
        self.shared.next_observer_id.fetch_add(1, Ordering::Relaxed)
    }

    fn notify(&self, snapshot: &Snapshot) {
        let observers = self
            .shared
            .observers
            .lock()
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for observer in observers {
            observer(snapshot);
        }
    }

    fn report(&self, error: SyncError) {
        warn!("Dropping inbound message: {}", snafu::Report::from_error(&error));
        let observers = self
            .shared
            .error_observers
            .lock()
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for observer in observers {
            observer(&error);
        }
    }
}

/// Holds the close receiver while `run` is active and returns it to the
/// session when `run` finishes or its future is dropped.
struct RunningGuard<'a> {
    slot: &'a Mutex<Option<oneshot::Receiver<()>>>,
    closed: Option<oneshot::Receiver<()>>,
}

impl<'a> RunningGuard<'a> {
    fn acquire(slot: &'a Mutex<Option<oneshot::Receiver<()>>>) -> Result<Self, SessionError> {
        let closed = slot.lock().take().context(AlreadyRunningSnafu)?;
        Ok(Self {
            slot,
            closed: Some(closed),
        })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Some(closed) = self.closed.take() {
            *self.slot.lock() = Some(closed);
        }
    }
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum ObserverKind {
    Snapshot,
    Error,
}

/// Keeps an observer registered. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes its observer"]
pub struct Subscription {
    session: Weak<SessionShared>,
    id: u64,
    kind: ObserverKind,
}

impl Subscription {
    fn new(shared: &Arc<SessionShared>, id: u64, kind: ObserverKind) -> Self {
        Self {
            session: Arc::downgrade(shared),
            id,
            kind,
        }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(shared) = self.session.upgrade() else {
            return;
        };
        match self.kind {
            ObserverKind::Snapshot => {
                shared.observers.lock().remove(&self.id);
            }
            ObserverKind::Error => {
                shared.error_observers.lock().remove(&self.id);
            }
        }
    }
}

/// Reported to error observers when an inbound message is dropped.
#[derive(Debug, Snafu)]
pub enum SyncError {
    #[snafu(display("Inbound message is malformed"))]
    MalformedMessage { source: MalformedMessageError },
    #[snafu(display("Change event path cannot be resolved"))]
    UnresolvablePath { source: InvalidPathError },
}

#[derive(Debug, Snafu)]
pub enum SessionError {
    #[snafu(display("Session is already consuming another stream"))]
    AlreadyRunning,
    #[snafu(display("Inbound stream ended before the session was closed"))]
    StreamEnded,
    #[snafu(display("Failed to read from the inbound stream"))]
    TransportError { source: io::Error },
}
