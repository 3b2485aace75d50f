//! **Reading coordinator** — one device cycle: intro, acquire, confirm.
//!
//! A cycle only completes when the user accepts the value on the done page.
//! Saying "retry" there re-takes the measurement without counting against
//! the failure ceiling; failures (device error or timeout) do count, and
//! hitting the ceiling aborts the whole session.

use crate::channel::ActionChannel;
use crate::controller::Services;
use crate::device::{DeviceAdapter, DeviceKind, Measurement};
use crate::nlu::ProceedDecision;
use crate::session::{Session, SessionAbort};
use crate::stage::Stage;
use std::sync::Arc;
use tokio::time::timeout;

pub struct ReadingCoordinator {
    devices: Arc<dyn DeviceAdapter>,
}

impl ReadingCoordinator {
    pub fn new(devices: Arc<dyn DeviceAdapter>) -> Self {
        Self { devices }
    }

    /// Run the full cycle for one device. On success the measurement is
    /// recorded in the session and the user has confirmed it.
    pub async fn run_cycle(
        &self,
        services: &Services,
        session: &mut Session,
        actions: &mut ActionChannel,
        kind: DeviceKind,
    ) -> Result<(), SessionAbort> {
        services.transition(session, actions, kind.intro_stage());
        if !services.wait_for_proceed(session, actions).await? {
            return Err(SessionAbort::GiveUp);
        }

        loop {
            services.transition(session, actions, kind.reading_stage());
            match self.acquire(services, kind).await? {
                Some(measurement) => {
                    session.record(measurement);
                    if self.confirm(services, session, actions, kind).await? {
                        return Ok(());
                    }
                    // user asked for a redo
                }
                None => {
                    session.retry_count += 1;
                    session.retry_device = Some(kind);
                    // the sorry page always shows the tally, even on the
                    // attempt that exhausts the budget
                    services.transition(session, actions, Stage::Sorry);
                    if session.retry_count >= services.config.max_retries {
                        tracing::warn!(
                            device = kind.label(),
                            retries = session.retry_count,
                            "retry ceiling reached"
                        );
                        return Err(SessionAbort::RetriesExhausted);
                    }
                    if !services.wait_for_proceed(session, actions).await? {
                        return Err(SessionAbort::GiveUp);
                    }
                }
            }
        }
    }

    /// Wait on the device, but yield instantly to a reset and bound the wait
    /// with the configured timeout. `None` means "no reading this attempt".
    async fn acquire(
        &self,
        services: &Services,
        kind: DeviceKind,
    ) -> Result<Option<Measurement>, SessionAbort> {
        tokio::select! {
            _ = services.reset.wait() => Err(SessionAbort::Reset),
            outcome = timeout(services.config.reading_timeout, self.devices.acquire(kind)) => {
                match outcome {
                    Ok(Ok(measurement)) => Ok(Some(measurement)),
                    Ok(Err(err)) => {
                        tracing::warn!(device = kind.label(), error = %err, "acquisition failed");
                        Ok(None)
                    }
                    Err(_) => {
                        tracing::warn!(device = kind.label(), "acquisition timed out");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Done-page gate. Returns `Ok(true)` when the user accepts the value,
    /// `Ok(false)` when they want the measurement re-taken.
    async fn confirm(
        &self,
        services: &Services,
        session: &mut Session,
        actions: &mut ActionChannel,
        kind: DeviceKind,
    ) -> Result<bool, SessionAbort> {
        services.transition(session, actions, kind.done_stage());
        loop {
            let text = services.next_action(actions).await?;
            if text.trim().eq_ignore_ascii_case("retry") {
                return Ok(false);
            }
            match services.decide_proceed(session, &text).await {
                ProceedDecision::Proceed => return Ok(true),
                ProceedDecision::Decline => return Err(SessionAbort::GiveUp),
                ProceedDecision::Diversion(reply) => services.say(&reply),
            }
        }
    }
}
