//! # Vitapod Voice — speech/listen turn coordination
//!
//! One kiosk, one voice, one pair of ears — never at the same time.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       TurnArbiter                         │
//! │   speak()/stop()           epoch + suppression (shared)   │
//! │        │                            ▲                     │
//! │        ▼                            │                     │
//! │  PlaybackBackend             transcript forwarder         │
//! │  (rodio / remote / null)     (drops text while speaking)  │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod arbiter;
pub mod error;
pub mod playback;
pub mod recognize;
pub mod synth;

pub use arbiter::{PlaybackHandle, TurnArbiter};
pub use error::{VoiceError, VoiceResult};
pub use playback::{NullPlayback, PlaybackBackend, RemotePlayback, RodioPlayback};
pub use recognize::{clean_transcript, spawn_transcript_forwarder};
pub use synth::{NullSynth, OpenAiSynth, TtsSynth};
