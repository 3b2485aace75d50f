//! **NLU oracle** — turns free-form user text into session decisions.
//!
//! Button presses arrive as canonical keywords and are resolved locally;
//! only genuinely free-form speech is sent to the language model. The model
//! never drives the session directly: it answers narrow yes/no and
//! option-matching questions and the session loop acts on the result.
//!
//! API key: `OPENROUTER_API_KEY` in `.env`. Default model:
//! `meta-llama/llama-3.3-70b-instruct`.

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

/// Outcome of a "may we move on?" gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProceedDecision {
    /// The user agreed; advance to the next stage.
    Proceed,
    /// The user explicitly declined.
    Decline,
    /// Off-topic or unclear; speak this redirection and ask again.
    Diversion(String),
}

/// Outcome of interpreting a questionnaire reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerIntent {
    /// The user chose to skip this question.
    Skip,
    /// The exact option text that matched.
    Answer(String),
    /// Nothing matched; re-ask.
    Unclear,
}

/// Language-understanding boundary of the session loop.
#[async_trait]
pub trait NluOracle: Send + Sync {
    /// Does `user_text` mean "go ahead" in the given page context?
    async fn should_proceed(&self, context: &str, user_text: &str) -> CoreResult<ProceedDecision>;

    /// Map `user_text` onto one of `options`, a skip, or neither.
    async fn interpret_answer(
        &self,
        question: &str,
        options: &[&str],
        user_text: &str,
    ) -> CoreResult<AnswerIntent>;
}

const YES_WORDS: &[&str] = &["yes", "ok", "okay", "sure", "ready", "continue", "done", "yep"];
const NO_WORDS: &[&str] = &["no", "exit", "stop", "quit", "nope"];

/// Resolve canonical keywords without a model round trip.
/// Returns `None` when the text needs real interpretation.
pub fn quick_proceed(user_text: &str) -> Option<ProceedDecision> {
    let text = user_text.trim().to_lowercase();
    if YES_WORDS.contains(&text.as_str()) || text == "start self-screening" {
        return Some(ProceedDecision::Proceed);
    }
    if NO_WORDS.contains(&text.as_str()) {
        return Some(ProceedDecision::Decline);
    }
    None
}

/// Local shortcut for questionnaire replies: "skip", a bare option number,
/// or the option text itself.
pub fn quick_answer(options: &[&str], user_text: &str) -> Option<AnswerIntent> {
    let text = user_text.trim().to_lowercase();
    if text == "skip" || text == "skip this question" {
        return Some(AnswerIntent::Skip);
    }
    let number = text
        .strip_prefix("option ")
        .unwrap_or(&text)
        .parse::<usize>()
        .ok();
    if let Some(n) = number {
        if (1..=options.len()).contains(&n) {
            return Some(AnswerIntent::Answer(options[n - 1].to_string()));
        }
    }
    options
        .iter()
        .find(|opt| opt.to_lowercase() == text)
        .map(|opt| AnswerIntent::Answer(opt.to_string()))
}

/// Keyword-only oracle for deployments without an API key. Buttons and the
/// canonical voice commands still work; free-form speech gets a re-ask.
pub struct LocalOracle;

#[async_trait]
impl NluOracle for LocalOracle {
    async fn should_proceed(&self, _context: &str, user_text: &str) -> CoreResult<ProceedDecision> {
        Ok(quick_proceed(user_text).unwrap_or_else(|| {
            ProceedDecision::Diversion(
                "Sorry, I can only take simple answers right now. \
                 Please use the buttons on my screen."
                    .to_string(),
            )
        }))
    }

    async fn interpret_answer(
        &self,
        _question: &str,
        options: &[&str],
        user_text: &str,
    ) -> CoreResult<AnswerIntent> {
        Ok(quick_answer(options, user_text).unwrap_or(AnswerIntent::Unclear))
    }
}

// OpenAI-compatible request/response for OpenRouter
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// OpenRouter-backed oracle. Keyword shortcuts are tried first so touch
/// input never costs a network call.
pub struct OpenRouterOracle {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenRouterOracle {
    /// Returns `None` if no `OPENROUTER_API_KEY` is present.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("OPENROUTER_API_KEY").ok()?.trim().to_string();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key))
    }

    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    async fn complete(&self, system: &str, user: &str) -> CoreResult<String> {
        let url = format!("{}/chat/completions", OPENROUTER_API_BASE);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(0.2),
            max_tokens: Some(256),
        };

        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Oracle(format!("request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Oracle(format!("API error {}: {}", status, body)));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| CoreError::Oracle(format!("response parse failed: {}", e)))?;

        parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| CoreError::Oracle("empty completion".to_string()))
    }
}

#[async_trait]
impl NluOracle for OpenRouterOracle {
    async fn should_proceed(&self, context: &str, user_text: &str) -> CoreResult<ProceedDecision> {
        if let Some(decision) = quick_proceed(user_text) {
            return Ok(decision);
        }

        let system = format!(
            "You are Vita, a friendly digital health assistant at a self-screening \
             kiosk. The user is currently {}. Decide whether their reply means they \
             agree to proceed. Answer with exactly YES, NO, or UNSURE on the first \
             line. If UNSURE, write one short friendly sentence on the second line \
             that answers them briefly and steers them back to the current step.",
            context
        );
        let raw = self.complete(&system, user_text).await?;
        let mut lines = raw.lines();
        let verdict = lines.next().unwrap_or("").trim().to_uppercase();
        match verdict.as_str() {
            "YES" => Ok(ProceedDecision::Proceed),
            "NO" => Ok(ProceedDecision::Decline),
            _ => {
                let reply = lines.next().map(str::trim).filter(|l| !l.is_empty());
                Ok(ProceedDecision::Diversion(
                    reply
                        .unwrap_or("I didn't quite catch that. Shall we carry on?")
                        .to_string(),
                ))
            }
        }
    }

    async fn interpret_answer(
        &self,
        question: &str,
        options: &[&str],
        user_text: &str,
    ) -> CoreResult<AnswerIntent> {
        if let Some(intent) = quick_answer(options, user_text) {
            return Ok(intent);
        }

        let listing = options
            .iter()
            .enumerate()
            .map(|(i, opt)| format!("{}. {}", i + 1, opt))
            .collect::<Vec<_>>()
            .join("\n");
        let system = format!(
            "You are matching a kiosk user's reply to a multiple-choice health \
             question. Question:\n{}\nOptions:\n{}\n\
             If the reply clearly selects one option, output that option's text \
             verbatim and nothing else. If the user wants to skip, output SKIP. \
             Otherwise output NONE.",
            question, listing
        );
        let raw = self.complete(&system, user_text).await?;
        let answer = raw.trim();
        if answer.eq_ignore_ascii_case("skip") {
            return Ok(AnswerIntent::Skip);
        }
        if answer.eq_ignore_ascii_case("none") {
            return Ok(AnswerIntent::Unclear);
        }
        // Accept only verbatim option text; anything else re-asks.
        match options.iter().find(|opt| opt.eq_ignore_ascii_case(answer)) {
            Some(opt) => Ok(AnswerIntent::Answer(opt.to_string())),
            None => Ok(AnswerIntent::Unclear),
        }
    }
}
