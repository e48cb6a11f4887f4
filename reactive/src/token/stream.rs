//! Shared, lazily-started result streams.
//!
//! A `QueryStream` is the hub created by `QueryToken::stream`. Observers
//! attach with [`QueryStream::subscribe`] and receive every merged result
//! the hub emits from then on.
//!
//! # Lifecycle
//!
//! 1. The first observer registers one `ChangeFeed` per constituent and
//!    spawns the coordinator task
//! 2. The coordinator fetches every constituent and emits the merged result
//! 3. Each change on constituent `i` recomputes constituent `i` only and
//!    re-emits the merged result
//! 4. When the last observer detaches the listeners are released and the
//!    coordinator is aborted; the next observer starts over from step 1
//!
//! A failed recompute is terminal: current observers receive the error and
//! their streams end, and later subscribers get the same error. If every
//! change feed closes, current observers' streams end and the next
//! observer starts over.
//!
//! # Design
//!
//! The coordinator holds a `Weak` reference to the hub so that a running
//! task never keeps an abandoned hub alive. The hub keeps a
//! `ListenerHandle` per feed, so detaching releases the engine listeners
//! synchronously instead of waiting for the aborted task to be dropped. Each start bumps a generation
//! counter; a coordinator that lost a race with its own abort sees a stale
//! generation and publishes nothing.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::error::{RecomputeError, TokenError};
use super::query_token::Constituent;
use crate::storage::{ChangeFeed, ListenerHandle, QueryShape};

type Emission<T> = Result<Vec<T>, TokenError>;

/// A shareable stream of merged query results.
///
/// Cloning yields another handle on the same hub.
pub struct QueryStream<T> {
    hub: Arc<Hub<T>>,
}

struct Hub<T> {
    shape: QueryShape,
    constituents: Vec<Arc<Constituent<T>>>,
    state: Mutex<HubState<T>>,
}

struct HubState<T> {
    next_observer: u64,
    observers: BTreeMap<u64, mpsc::UnboundedSender<Emission<T>>>,
    /// The most recent merged result of the running coordinator.
    latest: Option<Vec<T>>,
    coordinator: Option<tokio::task::AbortHandle>,
    /// Engine listeners of the running coordinator.
    listeners: Vec<ListenerHandle>,
    generation: u64,
    failure: Option<TokenError>,
}

impl<T> HubState<T> {
    /// Stop the running coordinator and release its listeners.
    ///
    /// Returns `false` if nothing was running.
    fn stop(&mut self) -> bool {
        let Some(coordinator) = self.coordinator.take() else {
            return false;
        };
        coordinator.abort();
        for listener in self.listeners.drain(..) {
            listener.release();
        }
        self.latest = None;
        true
    }
}

impl<T> Hub<T> {
    /// Lock the hub state.
    ///
    /// Every critical section leaves the state consistent, so a poisoned
    /// lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HubState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> QueryStream<T> {
    pub(crate) fn new(shape: QueryShape, constituents: Vec<Arc<Constituent<T>>>) -> Self {
        Self {
            hub: Arc::new(Hub {
                shape,
                constituents,
                state: Mutex::new(HubState {
                    next_observer: 0,
                    observers: BTreeMap::new(),
                    latest: None,
                    coordinator: None,
                    listeners: Vec::new(),
                    generation: 0,
                    failure: None,
                }),
            }),
        }
    }

    /// Attach a new observer.
    ///
    /// A late observer first receives the latest merged result, if one has
    /// been emitted, and then every later emission.
    ///
    /// # Errors
    ///
    /// - `TokenError::RuntimeUnavailable` outside a Tokio runtime
    /// - `TokenError::Engine` if the engine refuses a change listener
    /// - the terminal `TokenError::Recompute` if the stream has failed
    pub fn subscribe(&self) -> Result<Subscription<T>, TokenError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TokenError::RuntimeUnavailable)?;

        let mut state = self.hub.lock();
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        if let Some(latest) = &state.latest {
            // The receiver is held right here, so this cannot fail.
            let _ = sender.send(Ok(latest.clone()));
        }

        if state.coordinator.is_none() {
            let feeds = self
                .hub
                .constituents
                .iter()
                .map(|c| c.engine().observe(c.query()))
                .collect::<Result<Vec<ChangeFeed>, _>>()?;

            state.listeners = feeds.iter().map(ChangeFeed::listener).collect();
            state.generation += 1;
            let generation = state.generation;
            let task = runtime.spawn(coordinate(
                Arc::downgrade(&self.hub),
                generation,
                self.hub.constituents.clone(),
                feeds,
            ));
            state.coordinator = Some(task.abort_handle());
            tracing::debug!(
                "stream for '{}' started with {} constituents",
                self.hub.shape,
                self.hub.constituents.len()
            );
        }

        let id = state.next_observer;
        state.next_observer += 1;
        state.observers.insert(id, sender);
        drop(state);

        Ok(Subscription {
            id,
            receiver,
            hub: Arc::clone(&self.hub),
        })
    }
}

impl<T> QueryStream<T> {
    /// Number of attached observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.hub.lock().observers.len()
    }

    /// Whether the engine-level subscription is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.hub.lock().coordinator.is_some()
    }
}

impl<T> Clone for QueryStream<T> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<T> std::fmt::Debug for QueryStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStream")
            .field("shape", &self.hub.shape)
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// One observer of a `QueryStream`.
///
/// Yields every merged result emitted after it attached. Dropping it, or
/// calling [`Subscription::unsubscribe`], detaches it immediately.
pub struct Subscription<T> {
    id: u64,
    receiver: mpsc::UnboundedReceiver<Emission<T>>,
    hub: Arc<Hub<T>>,
}

impl<T> Subscription<T> {
    /// Detach this observer.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Emission<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let mut state = self.hub.lock();
        if state.observers.remove(&self.id).is_none() || !state.observers.is_empty() {
            return;
        }
        if state.stop() {
            tracing::debug!("stream for '{}' stopped: no observers left", self.hub.shape);
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// The coordinator task of one hub generation.
async fn coordinate<T: Clone + Send + Sync + 'static>(
    hub: Weak<Hub<T>>,
    generation: u64,
    constituents: Vec<Arc<Constituent<T>>>,
    feeds: Vec<ChangeFeed>,
) {
    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel::<usize>();
    let mut forwarders = JoinSet::new();
    for (index, mut feed) in feeds.into_iter().enumerate() {
        let changed = changed_tx.clone();
        forwarders.spawn(async move {
            while feed.changed().await.is_ok() {
                if changed.send(index).is_err() {
                    break;
                }
            }
        });
    }
    drop(changed_tx);

    let mut results = Vec::with_capacity(constituents.len());
    for (index, constituent) in constituents.iter().enumerate() {
        match constituent.evaluate().await {
            Ok(part) => results.push(part),
            Err(error) => return fail(&hub, generation, index, &error),
        }
    }
    if !publish(&hub, generation, &results) {
        return;
    }

    while let Some(index) = changed_rx.recv().await {
        match constituents[index].evaluate().await {
            Ok(part) => results[index] = part,
            Err(error) => return fail(&hub, generation, index, &error),
        }
        if !publish(&hub, generation, &results) {
            return;
        }
    }

    close(&hub, generation);
}

/// Send the merged result to every observer.
///
/// Returns `false` once this generation should stop.
fn publish<T: Clone>(hub: &Weak<Hub<T>>, generation: u64, results: &[Vec<T>]) -> bool {
    let Some(hub) = hub.upgrade() else {
        return false;
    };
    let mut state = hub.lock();
    if state.generation != generation || state.coordinator.is_none() {
        return false;
    }

    let merged: Vec<T> = results.iter().flatten().cloned().collect();
    state
        .observers
        .retain(|_, observer| observer.send(Ok(merged.clone())).is_ok());
    state.latest = Some(merged);
    true
}

/// Deliver a terminal recompute failure and shut the hub down.
fn fail<T>(hub: &Weak<Hub<T>>, generation: u64, constituent: usize, error: &TokenError) {
    let Some(hub) = hub.upgrade() else {
        return;
    };
    let mut state = hub.lock();
    if state.generation != generation || !state.stop() {
        return;
    }

    let failure = TokenError::Recompute(RecomputeError {
        constituent,
        message: error.to_string(),
    });
    tracing::error!("stream for '{}' failed: {failure}", hub.shape);

    // Dropping the senders ends each observer's stream after the error.
    for observer in std::mem::take(&mut state.observers).into_values() {
        let _ = observer.send(Err(failure.clone()));
    }
    state.failure = Some(failure);
}

/// End every observer's stream after the engine closed all change feeds.
///
/// The hub is left idle, so the next subscriber starts a new generation.
fn close<T>(hub: &Weak<Hub<T>>, generation: u64) {
    let Some(hub) = hub.upgrade() else {
        return;
    };
    let mut state = hub.lock();
    if state.generation != generation || !state.stop() {
        return;
    }

    let observers = std::mem::take(&mut state.observers);
    tracing::warn!(
        "stream for '{}' ended: all change feeds closed, {} observers detached",
        hub.shape,
        observers.len()
    );
}
