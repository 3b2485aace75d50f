//! **Playback backends** — where an utterance actually gets voiced.
//!
//! The arbiter drives one of three backends: `RodioPlayback` (kiosk-side audio
//! through a rodio sink), `RemotePlayback` (the display client voices the text
//! itself and reports back), or `NullPlayback` (degraded, log-only). Every
//! backend must return promptly from `play()` after `cancel()` is called.

use crate::error::{VoiceError, VoiceResult};
use crate::synth::TtsSynth;
use async_trait::async_trait;
use rodio::{OutputStream, Sink};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

/// One utterance sink. `play` resolves on natural completion or after `cancel`.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    async fn play(&self, text: &str) -> VoiceResult<()>;
    /// Cancel any in-flight `play` immediately. Must be safe to call at any time.
    fn cancel(&self);
}

/// Degraded backend: logs the utterance and completes immediately. Used when
/// no audio device or TTS key is available; the session must never block on it.
#[derive(Debug, Default)]
pub struct NullPlayback;

#[async_trait]
impl PlaybackBackend for NullPlayback {
    async fn play(&self, text: &str) -> VoiceResult<()> {
        info!("speech (muted backend): {}", text);
        Ok(())
    }

    fn cancel(&self) {}
}

/// Kiosk-side playback: synthesize via a `TtsSynth`, decode, and play through
/// a rodio sink. Optionally mirrors a `tts_active` flag to connected clients so
/// their UI can show a speaking indicator.
pub struct RodioPlayback {
    sink: Arc<Sink>,
    synth: Arc<dyn TtsSynth>,
    clients: Option<broadcast::Sender<String>>,
}

impl RodioPlayback {
    /// Open the default output device. rodio's `OutputStream` is not `Send`, so
    /// a dedicated thread owns it for the process lifetime and hands back the sink.
    pub fn new(
        synth: Arc<dyn TtsSynth>,
        clients: Option<broadcast::Sender<String>>,
    ) -> VoiceResult<Self> {
        let (tx, rx) = std::sync::mpsc::channel::<Result<Arc<Sink>, String>>();
        std::thread::Builder::new()
            .name("vitapod-audio".into())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = tx.send(Err(e.to_string()));
                        return;
                    }
                };
                match Sink::try_new(&handle) {
                    Ok(sink) => {
                        let _ = tx.send(Ok(Arc::new(sink)));
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e.to_string()));
                        return;
                    }
                }
                // Keep the stream alive; dropping it kills the sink.
                let _stream = stream;
                loop {
                    std::thread::park();
                }
            })
            .map_err(|e| VoiceError::Playback(e.to_string()))?;

        let sink = rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| VoiceError::Playback("audio thread did not start".to_string()))?
            .map_err(VoiceError::Playback)?;
        info!("playback: rodio sink ready");
        Ok(Self { sink, synth, clients })
    }

    fn set_active(&self, active: bool) {
        if let Some(ref tx) = self.clients {
            let frame = serde_json::json!({"type": "tts_active", "active": active});
            let _ = tx.send(frame.to_string());
        }
    }
}

#[async_trait]
impl PlaybackBackend for RodioPlayback {
    async fn play(&self, text: &str) -> VoiceResult<()> {
        let synth = Arc::clone(&self.synth);
        let owned = text.to_string();
        let bytes = tokio::task::spawn_blocking(move || synth.synthesize(&owned))
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))??;
        if bytes.is_empty() {
            return Ok(());
        }
        let source = rodio::Decoder::new(Cursor::new(bytes))
            .map_err(|e| VoiceError::Playback(format!("decode failed: {}", e)))?;
        self.sink.append(source);
        self.set_active(true);
        let sink = Arc::clone(&self.sink);
        let res = tokio::task::spawn_blocking(move || sink.sleep_until_end())
            .await
            .map_err(|e| VoiceError::Playback(e.to_string()));
        self.set_active(false);
        res
    }

    fn cancel(&self) {
        self.sink.stop();
        debug!("playback: sink cleared");
    }
}

/// Client-side playback: the utterance is pushed to the display client as a
/// `tts` frame and the client voices it. Capture stays suppressed for an
/// estimated duration (word count x seconds-per-word, floor applied) unless the
/// client reports `tts_status: stop` for that same utterance earlier. Each
/// frame carries an utterance id the client echoes back; a stop belonging to
/// a superseded utterance must never end the one in flight.
pub struct RemotePlayback {
    clients: broadcast::Sender<String>,
    finished: Notify,
    cancelled: Notify,
    /// Id of the utterance `play` is currently waiting on.
    utterance: AtomicU64,
    secs_per_word: f32,
    min_secs: f32,
}

impl RemotePlayback {
    pub fn new(clients: broadcast::Sender<String>) -> Self {
        Self {
            clients,
            finished: Notify::new(),
            cancelled: Notify::new(),
            utterance: AtomicU64::new(0),
            secs_per_word: 0.45,
            min_secs: 2.0,
        }
    }

    /// Estimated speaking time for `text`.
    pub fn estimate(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as f32;
        Duration::from_secs_f32((words * self.secs_per_word).max(self.min_secs))
    }

    /// Called by the gateway when a client reports playback status. Only a
    /// stop notification lifts suppression early, and only when its echoed
    /// utterance id matches the one in flight; start is informational. A stop
    /// without an id is taken to mean the current utterance.
    pub fn playback_status(&self, playing: bool, utterance: Option<u64>) {
        if playing {
            debug!("remote playback: client started speaking");
            return;
        }
        match utterance {
            Some(id) if id != self.utterance.load(Ordering::SeqCst) => {
                debug!("remote playback: ignoring stop for superseded utterance {}", id);
            }
            _ => self.finished.notify_waiters(),
        }
    }
}

#[async_trait]
impl PlaybackBackend for RemotePlayback {
    async fn play(&self, text: &str) -> VoiceResult<()> {
        let id = self.utterance.fetch_add(1, Ordering::SeqCst) + 1;
        // Arm the wakeups before sending so a fast client cannot race us.
        let finished = self.finished.notified();
        let cancelled = self.cancelled.notified();
        let frame = serde_json::json!({"type": "tts", "text": text, "utterance": id});
        if self.clients.send(frame.to_string()).is_err() {
            warn!("remote playback: no connected clients, skipping utterance");
            return Ok(());
        }
        let estimate = self.estimate(text);
        tokio::select! {
            _ = tokio::time::sleep(estimate) => {
                debug!("remote playback: estimate elapsed ({:?})", estimate);
            }
            _ = finished => {
                debug!("remote playback: client reported finish");
            }
            _ = cancelled => {
                debug!("remote playback: cancelled");
            }
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancelled.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_estimate_applies_floor() {
        let (tx, _rx) = broadcast::channel(4);
        let remote = RemotePlayback::new(tx);
        assert_eq!(remote.estimate("hi"), Duration::from_secs_f32(2.0));
        let long = "one two three four five six seven eight nine ten";
        assert_eq!(remote.estimate(long), Duration::from_secs_f32(4.5));
    }

    /// Reads the utterance id off a broadcast tts frame.
    fn utterance_id(frame: &str) -> u64 {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        assert_eq!(value["type"], "tts");
        value["utterance"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn remote_play_lifts_on_client_finish() {
        let (tx, mut rx) = broadcast::channel(4);
        let remote = Arc::new(RemotePlayback::new(tx));
        let speaker = Arc::clone(&remote);
        let worker = tokio::spawn(async move {
            speaker.play("a very long utterance that would block for seconds").await
        });
        // The tts frame must reach the client channel.
        let id = utterance_id(&rx.recv().await.unwrap());
        remote.playback_status(false, Some(id));
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("play should resolve on client finish")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn stale_stop_never_ends_the_next_utterance() {
        let (tx, mut rx) = broadcast::channel(4);
        let remote = Arc::new(RemotePlayback::new(tx));

        let speaker = Arc::clone(&remote);
        let first = tokio::spawn(async move { speaker.play("first utterance").await });
        let old_id = utterance_id(&rx.recv().await.unwrap());
        remote.cancel();
        first.await.unwrap().unwrap();

        let speaker = Arc::clone(&remote);
        let mut second = tokio::spawn(async move {
            speaker
                .play("a second utterance long enough that its estimate keeps the wait alive for many seconds")
                .await
        });
        let new_id = utterance_id(&rx.recv().await.unwrap());
        assert!(new_id > old_id);

        // The client winds down the superseded utterance late; its stop must
        // not end the one in flight.
        remote.playback_status(false, Some(old_id));
        assert!(
            tokio::time::timeout(Duration::from_millis(200), &mut second)
                .await
                .is_err(),
            "stop for a superseded utterance ended the current one"
        );

        remote.playback_status(false, Some(new_id));
        tokio::time::timeout(Duration::from_secs(1), second)
            .await
            .expect("matching stop should end the utterance")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn null_playback_completes_immediately() {
        NullPlayback.play("hello").await.unwrap();
    }
}
