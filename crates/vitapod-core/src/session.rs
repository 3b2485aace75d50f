//! **Session** — the mutable aggregate for one end-to-end screening run.
//!
//! Owned exclusively by the session loop; no other component mutates it.
//! A fresh instance is created every time the outer loop re-enters Idle, which
//! is also the only point where the retry counter returns to zero.

use crate::device::{DeviceKind, Measurement};
use crate::stage::Stage;
use std::collections::BTreeMap;

/// Why a session ended before (or at) the recap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAbort {
    /// A client pressed Reset; unwind to a fresh Idle session immediately.
    Reset,
    /// The user chose to give up after a failed reading.
    GiveUp,
    /// The retry ceiling was hit on a device cycle.
    RetriesExhausted,
}

/// Captured measurement values, filled in as the device cycles complete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    pub pulse_bpm: Option<u32>,
    pub spo2_pct: Option<u32>,
    pub systolic: Option<u32>,
    pub diastolic: Option<u32>,
    pub weight_kg: Option<f32>,
}

impl Readings {
    pub fn is_empty(&self) -> bool {
        *self == Readings::default()
    }

    pub fn oximeter_text(&self) -> String {
        format!(
            "{} bpm / {}%",
            display_or(self.pulse_bpm),
            display_or(self.spo2_pct)
        )
    }

    pub fn bp_text(&self) -> String {
        format!("{}/{}", display_or(self.systolic), display_or(self.diastolic))
    }

    pub fn weight_text(&self) -> String {
        match self.weight_kg {
            Some(kg) => format!("{:.1}", kg),
            None => "?".to_string(),
        }
    }
}

fn display_or(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

/// One run of the screening script, Idle through Recap or abort.
#[derive(Debug, Clone)]
pub struct Session {
    pub stage: Stage,
    pub page_id: u32,
    /// The text most recently displayed/spoken for this session.
    pub response: String,
    /// question key -> "skipped" or the exact matched option text.
    pub answers: BTreeMap<&'static str, String>,
    pub readings: Readings,
    /// The device a Sorry page refers back to.
    pub retry_device: Option<DeviceKind>,
    /// Consecutive device-acquisition failures; never reset mid-cycle.
    pub retry_count: u32,
}

impl Session {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            page_id: Stage::Idle.page_id(),
            response: String::new(),
            answers: BTreeMap::new(),
            readings: Readings::default(),
            retry_device: None,
            retry_count: 0,
        }
    }

    /// Move to `stage` with the text that accompanies it.
    pub fn enter(&mut self, stage: Stage, response: String) {
        self.stage = stage;
        self.page_id = stage.page_id();
        self.response = response;
    }

    /// Store a completed measurement in the right slot.
    pub fn record(&mut self, measurement: Measurement) {
        match measurement {
            Measurement::Oximeter { pulse_bpm, spo2_pct } => {
                self.readings.pulse_bpm = Some(pulse_bpm);
                self.readings.spo2_pct = Some(spo2_pct);
            }
            Measurement::BloodPressure { systolic, diastolic } => {
                self.readings.systolic = Some(systolic);
                self.readings.diastolic = Some(diastolic);
            }
            Measurement::Weight { kg } => {
                self.readings.weight_kg = Some(kg);
            }
        }
    }

    pub fn answer(&self, key: &str) -> &str {
        self.answers.get(key).map(String::as_str).unwrap_or("not answered")
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_fresh() {
        let s = Session::new();
        assert_eq!(s.stage, Stage::Idle);
        assert_eq!(s.page_id, 1);
        assert_eq!(s.retry_count, 0);
        assert!(s.answers.is_empty());
        assert!(s.readings.is_empty());
    }

    #[test]
    fn record_fills_the_right_slots() {
        let mut s = Session::new();
        s.record(Measurement::Oximeter { pulse_bpm: 72, spo2_pct: 98 });
        s.record(Measurement::BloodPressure { systolic: 125, diastolic: 82 });
        s.record(Measurement::Weight { kg: 74.2 });
        assert_eq!(s.readings.oximeter_text(), "72 bpm / 98%");
        assert_eq!(s.readings.bp_text(), "125/82");
        assert_eq!(s.readings.weight_text(), "74.2");
    }

    #[test]
    fn unanswered_questions_read_as_not_answered() {
        let mut s = Session::new();
        assert_eq!(s.answer("q1"), "not answered");
        s.answers.insert("q1", "skipped".to_string());
        assert_eq!(s.answer("q1"), "skipped");
    }
}
