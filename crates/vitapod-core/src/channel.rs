//! **Action channel and reset signal** — how user input reaches the session.
//!
//! All inputs (touch, speech, HTTP, terminal) funnel into a single unbounded
//! queue of plain text actions. The session loop polls it in short slices so
//! a Reset raised from any source is observed within 200 milliseconds even
//! while the loop is waiting on the user.

use crate::session::SessionAbort;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;

const POLL_SLICE: Duration = Duration::from_millis(200);

/// Producer half handed to every input source.
pub type ActionSender = mpsc::UnboundedSender<String>;

/// Session-wide abort flag, settable from any task.
///
/// The `Notify` side lets long waits (device acquisition) unblock immediately
/// instead of riding out their timeout.
#[derive(Clone, Default)]
pub struct ResetSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ResetSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is set. Returns immediately if already set.
    pub async fn wait(&self) {
        while !self.is_set() {
            let notified = self.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

/// Consumer half owned by the session loop.
pub struct ActionChannel {
    rx: mpsc::UnboundedReceiver<String>,
    reset: ResetSignal,
}

impl ActionChannel {
    pub fn new(reset: ResetSignal) -> (ActionSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx, reset })
    }

    /// Wait for the next action, checking the reset flag every poll slice.
    pub async fn recv(&mut self) -> Result<String, SessionAbort> {
        loop {
            if self.reset.is_set() {
                return Err(SessionAbort::Reset);
            }
            match timeout(POLL_SLICE, self.rx.recv()).await {
                Ok(Some(action)) => return Ok(action),
                // All senders dropped; treat as a reset so the loop unwinds.
                Ok(None) => return Err(SessionAbort::Reset),
                Err(_) => continue,
            }
        }
    }

    /// Discard anything queued before this point.
    ///
    /// Called on every stage transition so input given against an earlier
    /// page can never be taken as a reply to the new one.
    pub fn flush(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.rx.try_recv() {
                Ok(stale) => {
                    drained += 1;
                    tracing::debug!(action = %stale, "flushed stale action");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recv_returns_queued_action() {
        let reset = ResetSignal::new();
        let (tx, mut chan) = ActionChannel::new(reset);
        tx.send("yes".to_string()).unwrap();
        assert_eq!(chan.recv().await.unwrap(), "yes");
    }

    #[tokio::test(start_paused = true)]
    async fn recv_observes_reset_within_one_slice() {
        let reset = ResetSignal::new();
        let (_tx, mut chan) = ActionChannel::new(reset.clone());
        let waiter = tokio::spawn(async move { chan.recv().await });
        tokio::time::sleep(Duration::from_millis(500)).await;
        reset.set();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(waiter.await.unwrap(), Err(SessionAbort::Reset));
    }

    #[tokio::test]
    async fn flush_drains_everything_and_is_idempotent() {
        let reset = ResetSignal::new();
        let (tx, mut chan) = ActionChannel::new(reset);
        tx.send("a".to_string()).unwrap();
        tx.send("b".to_string()).unwrap();
        assert_eq!(chan.flush(), 2);
        assert_eq!(chan.flush(), 0);
        tx.send("c".to_string()).unwrap();
        assert_eq!(chan.recv().await.unwrap(), "c");
    }

    #[tokio::test]
    async fn wait_resolves_immediately_when_already_set() {
        let reset = ResetSignal::new();
        reset.set();
        reset.wait().await;
        reset.clear();
        assert!(!reset.is_set());
    }
}
