//! **Speech synthesis** — turn page text into audio bytes for local playback.
//!
//! Implement `TtsSynth` for any OpenAI-compatible speech API or a local engine.
//! Synthesis is blocking (reqwest blocking client); callers run it on a
//! blocking thread so the session loop is never held up.

use crate::error::{VoiceError, VoiceResult};

/// Backend that turns text into audio bytes (WAV/MP3). Return an empty vec to skip playback.
pub trait TtsSynth: Send + Sync {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// Silent synth: returns empty audio so nothing plays. Used when no TTS key is
/// configured; the session degrades to display-only output.
#[derive(Debug, Default)]
pub struct NullSynth;

impl TtsSynth for NullSynth {
    fn synthesize(&self, _text: &str) -> VoiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// Production synth: OpenAI-compatible `/audio/speech` endpoint (OpenAI, OpenRouter, etc.).
/// Reads `TTS_API_URL`, `TTS_API_KEY` (or `OPENROUTER_API_KEY`), `TTS_MODEL`, `TTS_VOICE`.
#[derive(Debug, Clone)]
pub struct OpenAiSynth {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// TTS model: tts-1 (fast) or tts-1-hd (higher quality).
    pub model: String,
    /// Voice id (alloy, echo, fable, onyx, nova, shimmer, ...).
    pub voice: String,
    client: reqwest::blocking::Client,
}

impl OpenAiSynth {
    /// Build from environment. Returns a config error if no API key is present.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("OPENROUTER_API_KEY"))
            .map_err(|_| {
                VoiceError::Config("TTS requires TTS_API_KEY or OPENROUTER_API_KEY".to_string())
            })?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "shimmer".to_string());
        Self::new(base_url, api_key, model, voice)
    }

    /// Create with explicit config (e.g. for tests or non-env wiring).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            client,
        })
    }
}

impl TtsSynth for OpenAiSynth {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
