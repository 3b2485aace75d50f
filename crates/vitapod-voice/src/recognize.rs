//! **Recognition ingestion** — the boundary with the speech-to-text front end.
//!
//! The acoustic model lives outside this crate; whatever front end is wired in
//! delivers raw transcripts over an mpsc channel. The forwarder scrubs them
//! (hallucination filter, punctuation trim) and pushes survivors into the
//! session's action queue — unless the arbiter says the kiosk is speaking, in
//! which case the text is dropped on the floor.

use crate::arbiter::TurnArbiter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Phrases speech models invent over silence or noise. Exact matches are dropped.
const HALLUCINATIONS: &[&str] = &[
    "Thank you for watching",
    "Thanks for watching",
    "Thank you for your attention",
    "Please subscribe",
    "Don't forget to like and subscribe",
    "Hit the bell icon",
    "You",
    "Subtitles by the Amara.org community",
];

/// Normalize one raw transcript. Returns `None` for empty text and known
/// hallucinations; otherwise the trimmed text without trailing punctuation.
pub fn clean_transcript(raw: &str) -> Option<String> {
    let text = raw.trim().trim_end_matches(['.', '!', '?', ',', ';']).trim();
    if text.is_empty() {
        return None;
    }
    if HALLUCINATIONS.iter().any(|h| h.eq_ignore_ascii_case(text)) {
        return None;
    }
    Some(text.to_string())
}

/// Spawn the forwarder: transcripts in, action events out. Runs until the
/// transcript channel closes.
pub fn spawn_transcript_forwarder(
    mut transcripts: mpsc::UnboundedReceiver<String>,
    actions: mpsc::UnboundedSender<String>,
    arbiter: Arc<TurnArbiter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(raw) = transcripts.recv().await {
            if arbiter.is_suppressed() {
                debug!("transcript dropped while speaking: {:?}", raw);
                continue;
            }
            let Some(text) = clean_transcript(&raw) else {
                continue;
            };
            info!("speech: {:?}", text);
            if actions.send(text).is_err() {
                break;
            }
        }
        debug!("transcript forwarder stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::NullPlayback;
    use std::time::Duration;

    #[test]
    fn cleans_punctuation_and_whitespace() {
        assert_eq!(clean_transcript("  yes please.  ").as_deref(), Some("yes please"));
        assert_eq!(clean_transcript("ready!?").as_deref(), Some("ready"));
    }

    #[test]
    fn drops_hallucinations_and_empty() {
        assert_eq!(clean_transcript(""), None);
        assert_eq!(clean_transcript("   .!?  "), None);
        assert_eq!(clean_transcript("Thank you for watching."), None);
        assert_eq!(clean_transcript("you"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn forwarder_drops_while_suppressed() {
        let arbiter = Arc::new(TurnArbiter::new(Arc::new(NullPlayback)));
        let (t_tx, t_rx) = mpsc::unbounded_channel();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        spawn_transcript_forwarder(t_rx, a_tx, Arc::clone(&arbiter));

        arbiter.speak("kiosk is talking");
        t_tx.send("should be dropped".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(a_rx.try_recv().is_err());

        arbiter.stop();
        t_tx.send("should pass".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(a_rx.try_recv().unwrap(), "should pass");
    }
}
