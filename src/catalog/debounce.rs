//! Trailing debounce for search input.
//!
//! `SearchDebouncer` is a plain state machine over `tokio::time::Instant`;
//! `run` drives it from a channel of raw keystrokes.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::filters::normalize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchUpdate {
    /// Apply this (normalized, non-empty) search term
    Apply(String),
    /// Input was cleared; drop the search constraint now
    Clear,
}

#[derive(Debug)]
pub struct SearchDebouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl SearchDebouncer {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Records a keystroke. An empty (trimmed) input cancels any pending
    /// update and yields an immediate `Clear`; anything else restarts the
    /// trailing timer.
    pub fn input(&mut self, raw: &str, now: Instant) -> Option<SearchUpdate> {
        let term = normalize(raw);
        if term.is_empty() {
            self.pending = None;
            return Some(SearchUpdate::Clear);
        }
        self.pending = Some((term, now + self.delay));
        None
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Releases the pending term once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<SearchUpdate> {
        match &self.pending {
            Some((_, at)) if *at <= now => self
                .pending
                .take()
                .map(|(term, _)| SearchUpdate::Apply(term)),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Drives the debouncer until the input channel closes or `token` is
    /// cancelled. A pending term is dropped, not flushed, on shutdown.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<String>,
        updates: mpsc::Sender<SearchUpdate>,
        token: CancellationToken,
    ) {
        loop {
            let deadline = self.deadline();
            let update = tokio::select! {
                biased;
                () = token.cancelled() => break,
                input = inputs.recv() => match input {
                    Some(raw) => self.input(&raw, Instant::now()),
                    None => break,
                },
                () = wait_for(deadline) => self.poll(Instant::now()),
            };

            if let Some(update) = update {
                debug!(?update, "Search update");
                if updates.send(update).await.is_err() {
                    break;
                }
            }
        }
        self.cancel();
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
