//! Keepalive watchdog
//!
//! `ping()` arms a timer. When it fires, the promise resolves and the session
//! sends a ping request, unless too many pings went unanswered, in which
//! case the promise rejects with `Timeout`.

use std::time::Duration;

use log::debug;
use tokio::task::{AbortHandle, JoinSet};

use crate::error::Error;
use crate::promise::{self, Promise, Resolver, Strand};

#[derive(Debug)]
pub struct Pinger {
    interval: Duration,
    max_outstanding: u64,
    pings: u64,
    pongs: u64,
    pending: Option<Resolver<()>>,
    timer: Option<AbortHandle>,
    /// Bumped whenever a timer is armed so stale firings can be told apart
    generation: u64,
    cancelled: bool,
}

impl Pinger {
    pub fn new(interval: Duration, max_outstanding: u32) -> Self {
        Self {
            interval,
            max_outstanding: u64::from(max_outstanding),
            pings: 0,
            pongs: 0,
            pending: None,
            timer: None,
            generation: 0,
            cancelled: false,
        }
    }

    /// Arm the timer; `on_fire(generation)` is posted to `strand` when it expires
    pub fn ping<E: Send + 'static>(
        &mut self,
        strand: &Strand<E>,
        tasks: &mut JoinSet<()>,
        on_fire: fn(u64) -> E,
    ) -> Promise<()> {
        if self.cancelled {
            return Promise::rejected(Error::Aborted);
        }

        if let Some(previous) = self.pending.take() {
            previous.reject(Error::OperationInProgress);
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let (resolver, promise) = promise::pair();
        self.pings += 1;
        self.pending = Some(resolver);
        self.generation += 1;
        self.timer = Some(strand.post_after(tasks, self.interval, on_fire(self.generation)));
        promise
    }

    /// Handle a timer firing
    pub fn on_timer(&mut self, generation: u64) {
        if generation != self.generation {
            debug!("[Pinger] ignoring stale timer {}", generation);
            return;
        }
        self.timer = None;

        let Some(resolver) = self.pending.take() else {
            return;
        };

        if self.cancelled {
            resolver.reject(Error::Aborted);
        } else if self.outstanding() > self.max_outstanding {
            resolver.reject(Error::Timeout);
        } else {
            resolver.resolve(());
        }
    }

    /// Record a ping response from the phone; surplus responses are ignored
    pub fn pong(&mut self) {
        if self.pongs < self.pings {
            self.pongs += 1;
        } else {
            debug!("[Pinger] ignoring unsolicited pong");
        }
    }

    /// Stop the watchdog; the pending ping rejects with `Aborted`
    pub fn cancel(&mut self) {
        self.cancelled = true;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(resolver) = self.pending.take() {
            resolver.reject(Error::Aborted);
        }
    }

    pub fn outstanding(&self) -> u64 {
        self.pings.saturating_sub(self.pongs)
    }
}
