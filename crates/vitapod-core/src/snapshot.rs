//! **State snapshots** — what every connected client sees.
//!
//! The session loop publishes a snapshot on each stage transition; the
//! gateway keeps the latest one for newly connecting clients and fans the
//! rest out over its broadcast channel.

use crate::device::DeviceKind;
use crate::session::Session;
use crate::stage::Stage;
use serde::Serialize;
use serde_json::{json, Value};

/// A point-in-time view of the session, pushed to UI clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StateSnapshot {
    pub page_id: u32,
    pub data: Value,
}

impl StateSnapshot {
    /// The wire frame sent to clients.
    pub fn to_frame(&self) -> String {
        json!({
            "type": "state",
            "page_id": self.page_id,
            "data": self.data,
        })
        .to_string()
    }
}

/// Where snapshots go. The gateway implements this; tests record them.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, snapshot: StateSnapshot);
}

/// Build the client-facing payload for the session's current stage.
pub fn build_snapshot(session: &Session) -> StateSnapshot {
    let stage = session.stage;
    let desc = stage.descriptor();
    let data = match stage {
        Stage::Idle => json!({}),
        Stage::Q1 | Stage::Q2 | Stage::Q3 => json!({
            "question": desc.message,
            "options": desc.options,
        }),
        Stage::OximeterIntro | Stage::OximeterReading => json!({
            "message": session.response,
            "device": "oximeter",
        }),
        Stage::BpIntro | Stage::BpReading => json!({
            "message": session.response,
            "device": "blood_pressure",
        }),
        Stage::ScaleIntro | Stage::ScaleReading => json!({
            "message": session.response,
            "device": "scale",
        }),
        Stage::OximeterDone => json!({
            "message": session.response,
            "value": session.readings.oximeter_text(),
            "unit": "bpm / %SpO2",
        }),
        Stage::BpDone => json!({
            "message": session.response,
            "value": session.readings.bp_text(),
            "unit": "mmHg",
        }),
        Stage::ScaleDone => json!({
            "message": session.response,
            "value": session.readings.weight_text(),
            "unit": "kg",
        }),
        Stage::Recap => json!({
            "message": session.response,
            "answers": {
                "q1": session.answer("q1"),
                "q2": session.answer("q2"),
                "q3": session.answer("q3"),
            },
            "readings": {
                "pulse_bpm": session.readings.pulse_bpm,
                "spo2_pct": session.readings.spo2_pct,
                "systolic": session.readings.systolic,
                "diastolic": session.readings.diastolic,
                "weight_kg": session.readings.weight_kg,
            },
        }),
        Stage::Sorry => json!({
            "message": session.response,
            "device": session.retry_device.map(DeviceKind::label),
            "attempt": session.retry_count,
        }),
        Stage::Welcome | Stage::MeasureIntro => json!({
            "message": session.response,
        }),
    };
    StateSnapshot {
        page_id: stage.page_id(),
        data,
    }
}

/// Compose the spoken/displayed text for entering `stage`.
///
/// Done pages prepend the freshly captured value; the Sorry page appends the
/// retry tally so the user knows how many attempts remain.
pub fn spoken_message(session: &Session, stage: Stage, max_retries: u32) -> String {
    let base = stage.descriptor().message;
    match stage {
        Stage::OximeterDone => format!(
            "Your reading is {}. {}",
            session.readings.oximeter_text(),
            base
        ),
        Stage::BpDone => format!(
            "Your blood pressure is {} mmHg. {}",
            session.readings.bp_text(),
            base
        ),
        Stage::ScaleDone => format!(
            "Your weight is {} kilograms. {}",
            session.readings.weight_text(),
            base
        ),
        Stage::Sorry => format!(
            "{} (Attempt {} of {})",
            base, session.retry_count, max_retries
        ),
        _ => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Measurement;

    #[test]
    fn idle_snapshot_has_empty_data() {
        let session = Session::new();
        let snap = build_snapshot(&session);
        assert_eq!(snap.page_id, 1);
        assert_eq!(snap.data, json!({}));
        let frame: Value = serde_json::from_str(&snap.to_frame()).unwrap();
        assert_eq!(frame["type"], "state");
        assert_eq!(frame["page_id"], 1);
    }

    #[test]
    fn question_snapshot_carries_options() {
        let mut session = Session::new();
        session.enter(Stage::Q2, Stage::Q2.descriptor().message.to_string());
        let snap = build_snapshot(&session);
        assert_eq!(snap.page_id, 4);
        assert_eq!(snap.data["options"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn done_message_leads_with_the_reading() {
        let mut session = Session::new();
        session.record(Measurement::BloodPressure { systolic: 118, diastolic: 76 });
        let text = spoken_message(&session, Stage::BpDone, 3);
        assert!(text.starts_with("Your blood pressure is 118/76 mmHg."));
    }

    #[test]
    fn sorry_message_counts_attempts() {
        let mut session = Session::new();
        session.retry_count = 2;
        let text = spoken_message(&session, Stage::Sorry, 3);
        assert!(text.ends_with("(Attempt 2 of 3)"));
    }

    #[test]
    fn sorry_snapshot_names_the_failing_device() {
        let mut session = Session::new();
        session.retry_count = 1;
        session.retry_device = Some(DeviceKind::Oximeter);
        session.enter(Stage::Sorry, "sorry".to_string());
        let snap = build_snapshot(&session);
        assert_eq!(snap.page_id, 17);
        assert_eq!(snap.data["device"], "oximeter");
        assert_eq!(snap.data["attempt"], 1);
    }

    #[test]
    fn recap_snapshot_includes_answers_and_readings() {
        let mut session = Session::new();
        session.answers.insert("q1", "Never".to_string());
        session.record(Measurement::Weight { kg: 81.5 });
        session.enter(Stage::Recap, Stage::Recap.descriptor().message.to_string());
        let snap = build_snapshot(&session);
        assert_eq!(snap.data["answers"]["q1"], "Never");
        assert_eq!(snap.data["answers"]["q2"], "not answered");
        assert_eq!(snap.data["readings"]["weight_kg"], 81.5);
        assert_eq!(snap.data["readings"]["pulse_bpm"], Value::Null);
    }
}
