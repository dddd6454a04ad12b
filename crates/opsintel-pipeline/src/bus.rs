//! Ops event bus
//!
//! Central pub/sub hub for the pipeline. A push runs the registered hooks,
//! appends the event to a bounded recent-history buffer and fans it out to
//! every live subscriber.
//!
//! Broadcast order is the `seq` order assigned under the bus lock. Delivery
//! runs through a single drainer: whichever pusher finds the dispatch queue
//! idle delivers queued events until the queue is empty, holding no bus lock
//! while subscribers run. A push made from inside a hook or a subscriber
//! callback just enqueues and returns, so reentrant publishing never
//! deadlocks and never reorders delivery.
//!
//! Every subscriber gets a bounded queue and is disconnected instead of
//! stalling the bus when it falls behind. Callback subscribers are fed from
//! their queue by a dedicated worker thread, so a slow callback only ever
//! delays itself.

use crate::config::BusConfig;
use crate::error::{PipelineError, PipelineResult};
use chrono::Utc;
use opsintel_types::{BusEvent, OpsEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::thread;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

/// Identifier of a live subscription
pub type SubscriberId = u64;

/// Callback invoked for every event delivered to a subscriber
pub type EventCallback = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// Observer run synchronously on every push, before the event is buffered
///
/// Hooks may push onto the bus they are given. Errors and panics are logged
/// and swallowed; they never abort the push.
pub trait BusHook: Send + Sync {
    fn name(&self) -> &str;

    fn on_event(&self, bus: &OpsBus, event: &OpsEvent) -> PipelineResult<()>;
}

struct Subscriber {
    queue: mpsc::Sender<BusEvent>,
    /// Events at or below this sequence predate the subscription
    after_seq: u64,
}

struct BusState {
    history: VecDeque<BusEvent>,
    pending: VecDeque<BusEvent>,
    next_seq: u64,
    draining: bool,
}

struct BusInner {
    config: BusConfig,
    state: Mutex<BusState>,
    subscribers: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,
    hooks: RwLock<Vec<Arc<dyn BusHook>>>,
    next_subscriber: AtomicU64,
    evicted_subscribers: AtomicU64,
}

/// Bus statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Sequence number of the most recent push (0 before the first)
    pub last_seq: u64,
    pub buffered: usize,
    pub subscribers: usize,
    pub hooks: usize,
    /// Subscribers dropped for falling behind
    pub evicted_subscribers: u64,
}

/// Handle to the shared ops bus
#[derive(Clone)]
pub struct OpsBus {
    inner: Arc<BusInner>,
}

impl OpsBus {
    pub fn new(config: BusConfig) -> Self {
        let history_capacity = config.history_capacity.max(1);
        Self {
            inner: Arc::new(BusInner {
                config,
                state: Mutex::new(BusState {
                    history: VecDeque::with_capacity(history_capacity),
                    pending: VecDeque::new(),
                    next_seq: 1,
                    draining: false,
                }),
                subscribers: RwLock::new(HashMap::new()),
                hooks: RwLock::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                evicted_subscribers: AtomicU64::new(0),
            }),
        }
    }

    /// Publish an event
    ///
    /// Returns the envelope the event was broadcast in.
    pub fn push(&self, event: OpsEvent) -> BusEvent {
        self.run_hooks(&event);

        let envelope = {
            let mut state = self.inner.state.lock();
            let envelope = BusEvent {
                seq: state.next_seq,
                published_at: Utc::now(),
                event,
            };
            state.next_seq += 1;

            state.history.push_back(envelope.clone());
            while state.history.len() > self.inner.config.history_capacity.max(1) {
                state.history.pop_front();
            }
            state.pending.push_back(envelope.clone());
            envelope
        };

        debug!(seq = envelope.seq, kind = envelope.event.kind(), "Event pushed");
        self.drain();
        envelope
    }

    /// Register a callback invoked on every subsequent push
    ///
    /// The callback runs on its own worker thread, in push order, fed from a
    /// bounded queue. A panicking callback is logged and stays registered; a
    /// callback that lets its queue fill up is disconnected. Events already
    /// queued when the handle is cancelled may still be delivered.
    pub fn subscribe_fn<F>(&self, callback: F) -> PipelineResult<SubscriptionHandle>
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let (tx, rx) = self.channel();
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        spawn_callback_worker(id, rx, Arc::new(callback))?;

        let state = self.inner.state.lock();
        let after_seq = state.next_seq - 1;
        Ok(self.register(id, tx, after_seq))
    }

    /// Subscribe through a bounded queue
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = self.channel();
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let state = self.inner.state.lock();
        let after_seq = state.next_seq - 1;
        let handle = self.register(id, tx, after_seq);
        Subscription {
            receiver: rx,
            handle,
        }
    }

    /// Snapshot the recent history and subscribe to everything after it
    ///
    /// Both happen under the bus lock, so every event is either in the
    /// returned backlog or delivered live, never both and never neither.
    pub fn subscribe_with_history(&self) -> (Vec<BusEvent>, Subscription) {
        let (tx, rx) = self.channel();
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let state = self.inner.state.lock();
        let backlog: Vec<BusEvent> = state.history.iter().cloned().collect();
        let after_seq = state.next_seq - 1;
        let handle = self.register(id, tx, after_seq);
        drop(state);

        (
            backlog,
            Subscription {
                receiver: rx,
                handle,
            },
        )
    }

    /// Copy of the buffered events, oldest first
    pub fn recent_history(&self) -> Vec<BusEvent> {
        self.inner.state.lock().history.iter().cloned().collect()
    }

    /// Add a pre-broadcast hook; hooks run in registration order
    pub fn register_hook(&self, hook: Arc<dyn BusHook>) {
        debug!(hook = hook.name(), "Registering bus hook");
        self.inner.hooks.write().push(hook);
    }

    /// Remove every hook
    pub fn clear_hooks(&self) {
        self.inner.hooks.write().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    pub fn stats(&self) -> BusStats {
        let (last_seq, buffered) = {
            let state = self.inner.state.lock();
            (state.next_seq - 1, state.history.len())
        };
        BusStats {
            last_seq,
            buffered,
            subscribers: self.subscriber_count(),
            hooks: self.inner.hooks.read().len(),
            evicted_subscribers: self.inner.evicted_subscribers.load(Ordering::Relaxed),
        }
    }

    fn channel(&self) -> (mpsc::Sender<BusEvent>, mpsc::Receiver<BusEvent>) {
        mpsc::channel(self.inner.config.subscriber_queue_capacity.max(1))
    }

    // Callers hold the state lock so `after_seq` and registration are atomic
    // with respect to pushes.
    fn register(
        &self,
        id: SubscriberId,
        queue: mpsc::Sender<BusEvent>,
        after_seq: u64,
    ) -> SubscriptionHandle {
        self.inner
            .subscribers
            .write()
            .insert(id, Arc::new(Subscriber { queue, after_seq }));
        debug!(subscriber = id, after_seq, "Subscriber registered");

        SubscriptionHandle {
            id,
            bus: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    fn run_hooks(&self, event: &OpsEvent) {
        let hooks = self.inner.hooks.read().clone();
        for hook in hooks {
            match catch_unwind(AssertUnwindSafe(|| hook.on_event(self, event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(hook = hook.name(), kind = event.kind(), error = %e, "Bus hook failed");
                }
                Err(_) => {
                    error!(hook = hook.name(), kind = event.kind(), "Bus hook panicked");
                }
            }
        }
    }

    fn drain(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let next = {
                let mut state = self.inner.state.lock();
                match state.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            self.deliver(&next);
        }
    }

    fn deliver(&self, event: &BusEvent) {
        let subscribers: Vec<(SubscriberId, Arc<Subscriber>)> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(id, sub)| (*id, Arc::clone(sub)))
            .collect();

        let mut dead = Vec::new();
        for (id, subscriber) in subscribers {
            if event.seq <= subscriber.after_seq {
                continue;
            }
            match subscriber.queue.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscriber = id,
                        seq = event.seq,
                        "Subscriber queue full, disconnecting slow consumer"
                    );
                    self.inner
                        .evicted_subscribers
                        .fetch_add(1, Ordering::Relaxed);
                    dead.push(id);
                }
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in dead {
                subscribers.remove(&id);
            }
        }
    }
}

fn spawn_callback_worker(
    id: SubscriberId,
    mut queue: mpsc::Receiver<BusEvent>,
    callback: EventCallback,
) -> PipelineResult<()> {
    thread::Builder::new()
        .name(format!("opsbus-subscriber-{id}"))
        .spawn(move || {
            // ends once the subscriber is cancelled or evicted and the queue drained
            while let Some(event) = queue.blocking_recv() {
                if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                    error!(subscriber = id, seq = event.seq, "Subscriber callback panicked");
                }
            }
            debug!(subscriber = id, "Subscriber worker stopped");
        })
        .map_err(|e| PipelineError::SubscriberWorker(e.to_string()))?;
    Ok(())
}

impl Default for OpsBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

/// Cancellation handle for a subscription
///
/// Cancelling is idempotent; dropping the handle cancels too.
#[must_use = "dropping the handle cancels the subscription"]
pub struct SubscriptionHandle {
    id: SubscriberId,
    bus: Weak<BusInner>,
    active: bool,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Cancel the subscription; returns whether it was still registered
    pub fn unsubscribe(mut self) -> bool {
        self.cancel()
    }

    fn cancel(&mut self) -> bool {
        if !std::mem::replace(&mut self.active, false) {
            return false;
        }
        match self.bus.upgrade() {
            Some(bus) => {
                let removed = bus.subscribers.write().remove(&self.id).is_some();
                debug!(subscriber = self.id, removed, "Subscriber cancelled");
                removed
            }
            None => false,
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A queue-backed subscription
pub struct Subscription {
    receiver: mpsc::Receiver<BusEvent>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.handle.id()
    }

    /// Next event; `None` once the subscription is cancelled or evicted and drained
    pub async fn recv(&mut self) -> Option<BusEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BusEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<BusEvent>> {
        self.receiver.poll_recv(cx)
    }

    pub fn unsubscribe(self) -> bool {
        self.handle.unsubscribe()
    }
}
