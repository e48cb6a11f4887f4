//! Query-scoped change feeds.
//!
//! A `ChangeFeed` wraps a receiver on the engine's broadcast channel and
//! filters notifications down to those that can alter one query's output.
//! The receiver is the engine-level listener: dropping the feed, or calling
//! [`ListenerHandle::release`] on one of its handles, deregisters it at once,
//! even while a task is parked in [`ChangeFeed::changed`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::broadcast;

use super::select::SelectQuery;
use crate::types::ChangeNotification;

type Receiver = broadcast::Receiver<Arc<ChangeNotification>>;
type Received = Result<Arc<ChangeNotification>, broadcast::error::RecvError>;

/// Where the feed's receiver currently lives.
enum Slot {
    Idle(Receiver),
    /// A pending receive that owns the receiver until it completes.
    Waiting(BoxFuture<'static, (Receiver, Received)>),
    Released,
}

/// A cancelable, push-based feed of "rows of this query changed" events.
pub struct ChangeFeed {
    query: SelectQuery,
    slot: Arc<Mutex<Slot>>,
}

/// Releases a feed's engine-level listener from outside the task that
/// drives the feed.
#[derive(Clone)]
pub struct ListenerHandle {
    slot: Arc<Mutex<Slot>>,
}

/// Returned once the engine side of a feed has gone away, or the feed's
/// listener was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedClosed;

impl std::fmt::Display for FeedClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "change feed closed")
    }
}

impl std::error::Error for FeedClosed {}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChangeFeed {
    /// Scope a broadcast receiver to a query.
    #[must_use]
    pub fn new(query: SelectQuery, receiver: Receiver) -> Self {
        Self {
            query,
            slot: Arc::new(Mutex::new(Slot::Idle(receiver))),
        }
    }

    #[must_use]
    pub const fn query(&self) -> &SelectQuery {
        &self.query
    }

    /// A handle that can release this feed's listener.
    #[must_use]
    pub fn listener(&self) -> ListenerHandle {
        ListenerHandle {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Check whether a notification can alter the query's output.
    #[must_use]
    pub fn is_relevant(&self, notification: &ChangeNotification) -> bool {
        notification.table == self.query.table()
            && notification
                .changes
                .iter()
                .any(|change| self.query.affected_by(change))
    }

    /// Wait for the next relevant change.
    ///
    /// Irrelevant notifications are skipped. If the receiver lagged behind
    /// the channel, changes were lost and one change is reported in their
    /// place.
    pub async fn changed(&mut self) -> Result<(), FeedClosed> {
        std::future::poll_fn(|cx| self.poll_changed(cx)).await
    }

    fn poll_changed(&self, cx: &mut Context<'_>) -> Poll<Result<(), FeedClosed>> {
        let mut slot = lock(&self.slot);
        loop {
            let mut waiting = match std::mem::replace(&mut *slot, Slot::Released) {
                Slot::Released => return Poll::Ready(Err(FeedClosed)),
                Slot::Waiting(waiting) => waiting,
                Slot::Idle(mut receiver) => async move {
                    let received = receiver.recv().await;
                    (receiver, received)
                }
                .boxed(),
            };

            let Poll::Ready((receiver, received)) = waiting.as_mut().poll(cx) else {
                *slot = Slot::Waiting(waiting);
                return Poll::Pending;
            };

            match received {
                Ok(notification) => {
                    *slot = Slot::Idle(receiver);
                    if self.is_relevant(&notification) {
                        return Poll::Ready(Ok(()));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    *slot = Slot::Idle(receiver);
                    tracing::warn!(
                        "change feed for '{}' lagged by {count} notifications",
                        self.query
                    );
                    return Poll::Ready(Ok(()));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("change feed for '{}' closed", self.query);
                    return Poll::Ready(Err(FeedClosed));
                }
            }
        }
    }
}

impl ListenerHandle {
    /// Deregister the listener now.
    ///
    /// A task waiting on the feed is not woken; its next poll returns
    /// `FeedClosed`.
    pub fn release(&self) {
        let released = std::mem::replace(&mut *lock(&self.slot), Slot::Released);
        drop(released);
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        matches!(*lock(&self.slot), Slot::Released)
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("query", &self.query)
            .field("released", &self.listener().is_released())
            .finish()
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("released", &self.is_released())
            .finish()
    }
}
