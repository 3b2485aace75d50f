//! **Session controller** — drives the screening script from Idle to Recap.
//!
//! Every stage transition follows the same order: update the session, push
//! the snapshot, flush stale input, then start speaking. Flushing before the
//! speak means input queued against the previous page can never answer the
//! new one.

use crate::channel::ActionChannel;
use crate::device::DeviceKind;
use crate::nlu::{AnswerIntent, NluOracle, ProceedDecision};
use crate::printer::ReceiptPrinter;
use crate::reading::ReadingCoordinator;
use crate::session::{Session, SessionAbort};
use crate::snapshot::{build_snapshot, spoken_message, SnapshotSink};
use crate::stage::Stage;
use crate::{MAX_RETRIES, READING_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;
use vitapod_voice::TurnArbiter;

const UNCLEAR_REPLY: &str = "Sorry, I didn't quite catch that. Could you try again?";

/// Tunables for one kiosk deployment.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Longest we wait for a device to settle on a value.
    pub reading_timeout: Duration,
    /// Failed acquisitions allowed per session before aborting.
    pub max_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reading_timeout: READING_TIMEOUT,
            max_retries: MAX_RETRIES,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The user reached the recap.
    Completed,
    /// A client pressed Reset.
    Reset,
    /// The user declined, gave up, or the retry ceiling was hit.
    Abandoned,
}

/// Shared handles the session loop and reading coordinator both need.
#[derive(Clone)]
pub struct Services {
    pub reset: crate::channel::ResetSignal,
    pub arbiter: Arc<TurnArbiter>,
    pub sink: Arc<dyn SnapshotSink>,
    pub oracle: Arc<dyn NluOracle>,
    pub config: SessionConfig,
}

impl Services {
    /// Enter `stage`: session state, snapshot, flush, speak. In that order.
    pub fn transition(&self, session: &mut Session, actions: &mut ActionChannel, stage: Stage) {
        let text = spoken_message(session, stage, self.config.max_retries);
        session.enter(stage, text.clone());
        tracing::info!(stage = ?stage, page_id = session.page_id, "stage transition");
        self.sink.publish(build_snapshot(session));
        actions.flush();
        self.arbiter.speak(&text);
    }

    pub fn say(&self, text: &str) {
        self.arbiter.speak(text);
    }

    /// Next user action. Arriving input always cuts speech short.
    pub async fn next_action(&self, actions: &mut ActionChannel) -> Result<String, SessionAbort> {
        let text = actions.recv().await?;
        self.arbiter.stop();
        tracing::debug!(action = %text, "user action");
        Ok(text)
    }

    /// Ask the oracle whether `text` means "go ahead" on the current page.
    /// Oracle failures degrade to a re-ask rather than ending the session.
    pub async fn decide_proceed(&self, session: &Session, text: &str) -> ProceedDecision {
        let context = session.stage.descriptor().action_context;
        match self.oracle.should_proceed(context, text).await {
            Ok(decision) => decision,
            Err(err) => {
                tracing::warn!(error = %err, "proceed oracle failed");
                ProceedDecision::Diversion(UNCLEAR_REPLY.to_string())
            }
        }
    }

    /// Block until the user agrees to move on. `Ok(false)` means they
    /// explicitly declined.
    pub async fn wait_for_proceed(
        &self,
        session: &Session,
        actions: &mut ActionChannel,
    ) -> Result<bool, SessionAbort> {
        loop {
            let text = self.next_action(actions).await?;
            match self.decide_proceed(session, &text).await {
                ProceedDecision::Proceed => return Ok(true),
                ProceedDecision::Decline => return Ok(false),
                ProceedDecision::Diversion(reply) => self.say(&reply),
            }
        }
    }
}

/// Owns the action queue and loops sessions forever.
pub struct SessionController {
    services: Services,
    actions: ActionChannel,
    readings: ReadingCoordinator,
    printer: Option<Arc<ReceiptPrinter>>,
}

impl SessionController {
    pub fn new(
        services: Services,
        actions: ActionChannel,
        readings: ReadingCoordinator,
        printer: Option<Arc<ReceiptPrinter>>,
    ) -> Self {
        Self {
            services,
            actions,
            readings,
            printer,
        }
    }

    /// Kiosk main loop: one session after another, forever.
    pub async fn run(mut self) {
        loop {
            let outcome = self.run_once().await;
            tracing::info!(?outcome, "session ended");
        }
    }

    /// Run a single session from a fresh Idle state.
    pub async fn run_once(&mut self) -> SessionOutcome {
        self.services.reset.clear();
        let mut session = Session::new();
        match self.drive(&mut session).await {
            Ok(outcome) => outcome,
            Err(SessionAbort::Reset) => {
                self.services.arbiter.stop();
                SessionOutcome::Reset
            }
            Err(SessionAbort::GiveUp) => {
                self.services
                    .say("No problem. Thank you for visiting, and take care.");
                SessionOutcome::Abandoned
            }
            Err(SessionAbort::RetriesExhausted) => {
                self.services.say(
                    "I'm sorry, we couldn't complete that measurement. \
                     Please ask a member of staff for assistance.",
                );
                SessionOutcome::Abandoned
            }
        }
    }

    async fn drive(&mut self, session: &mut Session) -> Result<SessionOutcome, SessionAbort> {
        let services = self.services.clone();

        // Idle: wait for someone to start. Declines keep us idle.
        services.transition(session, &mut self.actions, Stage::Idle);
        loop {
            let text = services.next_action(&mut self.actions).await?;
            match services.decide_proceed(session, &text).await {
                ProceedDecision::Proceed => break,
                ProceedDecision::Decline => continue,
                ProceedDecision::Diversion(reply) => services.say(&reply),
            }
        }

        services.transition(session, &mut self.actions, Stage::Welcome);
        if !services.wait_for_proceed(session, &mut self.actions).await? {
            return Ok(SessionOutcome::Abandoned);
        }

        for stage in [Stage::Q1, Stage::Q2, Stage::Q3] {
            let Some(key) = stage.question_key() else { continue };
            self.ask_question(&services, session, stage, key).await?;
        }

        services.transition(session, &mut self.actions, Stage::MeasureIntro);
        if !services.wait_for_proceed(session, &mut self.actions).await? {
            return Ok(SessionOutcome::Abandoned);
        }

        for kind in DeviceKind::CYCLE_ORDER {
            self.readings
                .run_cycle(&services, session, &mut self.actions, kind)
                .await?;
        }

        services.transition(session, &mut self.actions, Stage::Recap);
        self.print_receipt(session);

        // Recap holds until the user finishes, one way or the other.
        let _ = services.wait_for_proceed(session, &mut self.actions).await?;
        Ok(SessionOutcome::Completed)
    }

    async fn ask_question(
        &mut self,
        services: &Services,
        session: &mut Session,
        stage: Stage,
        key: &'static str,
    ) -> Result<(), SessionAbort> {
        let desc = stage.descriptor();
        services.transition(session, &mut self.actions, stage);
        loop {
            let text = services.next_action(&mut self.actions).await?;
            let intent = match services
                .oracle
                .interpret_answer(desc.message, desc.options, &text)
                .await
            {
                Ok(intent) => intent,
                Err(err) => {
                    tracing::warn!(error = %err, question = key, "answer oracle failed");
                    AnswerIntent::Unclear
                }
            };
            match intent {
                AnswerIntent::Skip => {
                    session.answers.insert(key, "skipped".to_string());
                    return Ok(());
                }
                AnswerIntent::Answer(answer) => {
                    session.answers.insert(key, answer);
                    return Ok(());
                }
                // re-ask with the full option list so the user can recover
                AnswerIntent::Unclear => {
                    services.say(&format!("Sorry, I didn't catch that. {}", desc.message))
                }
            }
        }
    }

    /// Receipt failures never block the recap.
    fn print_receipt(&self, session: &Session) {
        if let Some(printer) = &self.printer {
            if let Err(err) = printer.print(session) {
                tracing::error!(error = %err, "receipt print failed");
            }
        }
    }
}
