//! **TurnArbiter** — mutual exclusion between synthesized speech and live capture.
//!
//! The capture pipeline must never hear the kiosk's own voice. While an
//! utterance plays, capture is suppressed; suppression lifts a short drain
//! delay after playback ends. Every `speak` supersedes the one in flight:
//! a monotonically increasing epoch identifies the current utterance, and a
//! worker that finds a newer epoch must not touch suppression. Epoch and
//! suppression live under one lock so the check and the flip are a single
//! step; a superseded worker cannot slip its unmute between another caller's
//! updates.

use crate::playback::PlaybackBackend;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Residual audio can still be in the room when the backend reports completion.
const DRAIN_DELAY: Duration = Duration::from_millis(300);

/// Identifies one speak operation. Stale handles lose every race by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlaybackHandle(pub u64);

#[derive(Debug, Default)]
struct TurnState {
    epoch: u64,
    suppressed: bool,
}

/// Arbitrates the single speech/listen turn. Shared by the session loop,
/// playback workers, and the recognition pipeline.
pub struct TurnArbiter {
    state: Arc<Mutex<TurnState>>,
    backend: Arc<dyn PlaybackBackend>,
    drain_delay: Duration,
}

// The lock is never held across an await, so a poisoned guard still carries
// consistent state.
fn lock(state: &Mutex<TurnState>) -> MutexGuard<'_, TurnState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TurnArbiter {
    pub fn new(backend: Arc<dyn PlaybackBackend>) -> Self {
        Self::with_drain_delay(backend, DRAIN_DELAY)
    }

    pub fn with_drain_delay(backend: Arc<dyn PlaybackBackend>, drain_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(TurnState::default())),
            backend,
            drain_delay,
        }
    }

    /// Start speaking `text`, superseding any utterance in progress.
    /// Capture is suppressed before the backend is touched so the microphone
    /// cannot pick up even the first syllable.
    pub fn speak(&self, text: &str) -> PlaybackHandle {
        let epoch = {
            let mut state = lock(&self.state);
            state.suppressed = true;
            state.epoch += 1;
            state.epoch
        };
        self.backend.cancel();

        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.state);
        let drain = self.drain_delay;
        let text = text.to_string();
        tokio::spawn(async move {
            if let Err(e) = backend.play(&text).await {
                warn!("playback failed, continuing without speech: {}", e);
            }
            tokio::time::sleep(drain).await;
            // Only the current epoch may lift suppression; a superseded worker
            // waking up late must leave the turn state alone.
            let mut state = lock(&shared);
            if state.epoch == epoch {
                state.suppressed = false;
                debug!("capture resumed (epoch {})", epoch);
            } else {
                debug!("stale playback worker (epoch {}) exiting", epoch);
            }
        });
        PlaybackHandle(epoch)
    }

    /// Cut speech immediately. The epoch bump turns the terminated worker's
    /// eventual cleanup into a no-op; capture resumes right away.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.state);
            state.epoch += 1;
            state.suppressed = false;
        }
        self.backend.cancel();
    }

    /// Whether recognized speech should currently be discarded.
    pub fn is_suppressed(&self) -> bool {
        lock(&self.state).suppressed
    }

    pub fn current_epoch(&self) -> PlaybackHandle {
        PlaybackHandle(lock(&self.state).epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoiceResult;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Backend whose `play` blocks until the gate is released, so tests control
    /// when each utterance "finishes". `cancel` releases in-flight plays only.
    struct GatedPlayback {
        gate: Notify,
    }

    impl GatedPlayback {
        fn new() -> Self {
            Self { gate: Notify::new() }
        }

        fn release(&self) {
            self.gate.notify_waiters();
        }
    }

    #[async_trait]
    impl PlaybackBackend for GatedPlayback {
        async fn play(&self, _text: &str) -> VoiceResult<()> {
            self.gate.notified().await;
            Ok(())
        }

        fn cancel(&self) {
            self.gate.notify_waiters();
        }
    }

    /// Let spawned workers reach their first await point.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn speak_suppresses_and_lifts_after_drain() {
        let backend = Arc::new(GatedPlayback::new());
        let arbiter = TurnArbiter::new(Arc::clone(&backend) as Arc<dyn PlaybackBackend>);

        arbiter.speak("hello");
        assert!(arbiter.is_suppressed());
        settle().await;

        backend.release(); // utterance finishes naturally
        tokio::time::sleep(DRAIN_DELAY * 2).await;
        assert!(!arbiter.is_suppressed());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_worker_never_unmutes_newer_epoch() {
        let backend = Arc::new(GatedPlayback::new());
        let arbiter = TurnArbiter::new(Arc::clone(&backend) as Arc<dyn PlaybackBackend>);

        let a = arbiter.speak("utterance A");
        settle().await;
        // speak(B) cancels A mid-utterance; A's worker drains and finds epoch B.
        let b = arbiter.speak("utterance B");
        assert!(b > a);

        tokio::time::sleep(DRAIN_DELAY * 4).await;
        // B is still playing, so capture must stay suppressed no matter what
        // A's worker did on its way out.
        assert!(arbiter.is_suppressed());
        assert_eq!(arbiter.current_epoch(), b);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_draining_across_a_new_speak_leaves_suppression_set() {
        let backend = Arc::new(GatedPlayback::new());
        let arbiter = TurnArbiter::new(Arc::clone(&backend) as Arc<dyn PlaybackBackend>);

        arbiter.speak("utterance A");
        settle().await;
        backend.release(); // A finishes naturally and enters its drain wait
        settle().await;

        // B arrives while A's worker is mid-drain; A's cleanup lands after B
        // has taken the turn and must leave B's suppression in place.
        let b = arbiter.speak("utterance B");
        tokio::time::sleep(DRAIN_DELAY * 2).await;

        assert!(arbiter.is_suppressed());
        assert_eq!(arbiter.current_epoch(), b);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resumes_capture_and_bumps_epoch() {
        let backend = Arc::new(GatedPlayback::new());
        let arbiter = TurnArbiter::new(Arc::clone(&backend) as Arc<dyn PlaybackBackend>);

        let handle = arbiter.speak("hello");
        settle().await;
        arbiter.stop();
        assert!(!arbiter.is_suppressed());
        assert!(arbiter.current_epoch() > handle);

        // The cancelled worker drains later; it must not flip anything back.
        tokio::time::sleep(DRAIN_DELAY * 2).await;
        assert!(!arbiter.is_suppressed());
    }
}
