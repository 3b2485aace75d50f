//! # Vitapod Core — session orchestration for the self-screening kiosk
//!
//! One session at a time, driven by a fixed script:
//!
//! ```text
//! Idle → Welcome → Q1..Q3 → MeasureIntro
//!      → (oximeter → blood pressure → scale, each: intro/reading/done)
//!      → Recap → Idle
//! ```
//!
//! All user input arrives on a single action queue; a Reset raised from any
//! client unwinds the session to a fresh Idle within one poll slice. Stage
//! transitions publish a [`snapshot::StateSnapshot`] to every client, flush
//! stale input, then speak through the voice arbiter.

use std::time::Duration;

pub mod channel;
pub mod controller;
pub mod device;
pub mod error;
pub mod nlu;
pub mod printer;
pub mod reading;
pub mod session;
pub mod snapshot;
pub mod stage;

/// Longest wait for a device to produce a value before it counts as a miss.
pub const READING_TIMEOUT: Duration = Duration::from_secs(30);

/// Failed acquisitions allowed per session before giving up.
pub const MAX_RETRIES: u32 = 3;

pub use channel::{ActionChannel, ActionSender, ResetSignal};
pub use controller::{Services, SessionConfig, SessionController, SessionOutcome};
pub use device::{DeviceAdapter, DeviceKind, Measurement, SimulatedDevices};
pub use error::{CoreError, CoreResult};
pub use nlu::{AnswerIntent, LocalOracle, NluOracle, OpenRouterOracle, ProceedDecision};
pub use printer::ReceiptPrinter;
pub use reading::ReadingCoordinator;
pub use session::{Readings, Session, SessionAbort};
pub use snapshot::{build_snapshot, spoken_message, SnapshotSink, StateSnapshot};
pub use stage::{PageDescriptor, Stage};
