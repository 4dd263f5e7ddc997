//! # Continuations
//!
//! A [`Promise`] is the consumer side of a single-assignment result slot, a
//! [`Resolver`] the producer side. The producer may complete before anyone
//! awaits; the value is kept until the promise is polled.
//!
//! ```text
//!   Resolver ──resolve/reject──► slot ──await──► Promise
//!      │                                            │
//!      └── dropped: Aborted                cancel() ┘  (no-op once completed)
//! ```
//!
//! A [`Strand`] is the sending side of a session mailbox. Watching a promise
//! through a strand runs the continuation on the session actor: the result is
//! mapped to an event and posted to the mailbox. Watcher tasks live in a
//! `JoinSet`, so aborting the set cancels every pending continuation.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinSet};

use crate::error::{Error, Result};

/// Create a connected resolver/promise pair
pub fn pair<T>() -> (Resolver<T>, Promise<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Promise { rx })
}

/// Producer side of a continuation
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    pub fn reject(self, error: Error) {
        let _ = self.tx.send(Err(error));
    }

    pub fn complete(self, result: Result<T>) {
        let _ = self.tx.send(result);
    }

    /// Complete the slot, handing the result back if the promise is gone
    pub fn try_complete(self, result: Result<T>) -> std::result::Result<(), Result<T>> {
        self.tx.send(result)
    }

    /// Whether the promise was dropped or cancelled
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of a continuation
#[derive(Debug)]
pub struct Promise<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Promise<T> {
    /// An already resolved promise
    pub fn resolved(value: T) -> Self {
        let (resolver, promise) = pair();
        resolver.resolve(value);
        promise
    }

    /// An already rejected promise
    pub fn rejected(error: Error) -> Self {
        let (resolver, promise) = pair();
        resolver.reject(error);
        promise
    }

    /// Reject with `Aborted` unless a result was already delivered
    pub fn cancel(&mut self) {
        self.rx.close();
    }

    /// Take the result if it is available without waiting
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::Aborted)),
        }
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Aborted)))
    }
}

/// Sender side of a session mailbox
#[derive(Debug)]
pub struct Strand<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> Clone for Strand<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: Send + 'static> Strand<E> {
    /// Create a strand and the mailbox it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::UnboundedSender<E>) -> Self {
        Self { tx }
    }

    /// Raw sender, for producers living outside the session
    pub fn sender(&self) -> mpsc::UnboundedSender<E> {
        self.tx.clone()
    }

    /// Post an event; false once the mailbox is closed
    pub fn post(&self, event: E) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Post `event` after `delay`
    pub fn post_after(&self, tasks: &mut JoinSet<()>, delay: Duration, event: E) -> AbortHandle {
        let tx = self.tx.clone();
        tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        })
    }

    /// Post `map(result)` once `promise` completes
    pub fn watch<T, F>(&self, tasks: &mut JoinSet<()>, promise: Promise<T>, map: F) -> AbortHandle
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) -> E + Send + 'static,
    {
        self.watch_filtered(tasks, promise, move |result| Some(map(result)))
    }

    /// Like [`Strand::watch`], but the mapping may swallow the result
    pub fn watch_filtered<T, F>(
        &self,
        tasks: &mut JoinSet<()>,
        promise: Promise<T>,
        map: F,
    ) -> AbortHandle
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) -> Option<E> + Send + 'static,
    {
        let tx = self.tx.clone();
        tasks.spawn(async move {
            if let Some(event) = map(promise.await) {
                let _ = tx.send(event);
            }
        })
    }
}
