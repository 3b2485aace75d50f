//! **Measurement devices** — the hardware boundary of the kiosk.
//!
//! Real peripherals sit behind [`DeviceAdapter`]; the simulated adapter
//! exists for bench setups with no hardware attached and produces values in
//! plausible adult ranges after a short delay.

use crate::error::{CoreError, CoreResult};
use crate::stage::Stage;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// The three instruments used in a screening, in script order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Oximeter,
    BloodPressure,
    Scale,
}

impl DeviceKind {
    pub const CYCLE_ORDER: [DeviceKind; 3] =
        [DeviceKind::Oximeter, DeviceKind::BloodPressure, DeviceKind::Scale];

    pub fn label(self) -> &'static str {
        match self {
            DeviceKind::Oximeter => "oximeter",
            DeviceKind::BloodPressure => "blood pressure monitor",
            DeviceKind::Scale => "scale",
        }
    }

    pub fn intro_stage(self) -> Stage {
        match self {
            DeviceKind::Oximeter => Stage::OximeterIntro,
            DeviceKind::BloodPressure => Stage::BpIntro,
            DeviceKind::Scale => Stage::ScaleIntro,
        }
    }

    pub fn reading_stage(self) -> Stage {
        match self {
            DeviceKind::Oximeter => Stage::OximeterReading,
            DeviceKind::BloodPressure => Stage::BpReading,
            DeviceKind::Scale => Stage::ScaleReading,
        }
    }

    pub fn done_stage(self) -> Stage {
        match self {
            DeviceKind::Oximeter => Stage::OximeterDone,
            DeviceKind::BloodPressure => Stage::BpDone,
            DeviceKind::Scale => Stage::ScaleDone,
        }
    }
}

/// One captured value set from a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    Oximeter { pulse_bpm: u32, spo2_pct: u32 },
    BloodPressure { systolic: u32, diastolic: u32 },
    Weight { kg: f32 },
}

/// Hardware access. `acquire` resolves when the device has settled on a
/// value; callers impose their own timeout.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    async fn acquire(&self, kind: DeviceKind) -> CoreResult<Measurement>;
}

/// Bench adapter: no hardware, plausible values, tunable failure rate.
pub struct SimulatedDevices {
    settle_delay: Duration,
    failure_rate: f64,
}

impl SimulatedDevices {
    pub fn new() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            failure_rate: 0.0,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Probability in [0, 1] that an acquisition reports no reading.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }
}

impl Default for SimulatedDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceAdapter for SimulatedDevices {
    async fn acquire(&self, kind: DeviceKind) -> CoreResult<Measurement> {
        tokio::time::sleep(self.settle_delay).await;
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.failure_rate) {
            return Err(CoreError::Device(format!("{}: no stable reading", kind.label())));
        }
        let measurement = match kind {
            DeviceKind::Oximeter => Measurement::Oximeter {
                pulse_bpm: rng.gen_range(60..=100),
                spo2_pct: rng.gen_range(95..=100),
            },
            DeviceKind::BloodPressure => Measurement::BloodPressure {
                systolic: rng.gen_range(110..=140),
                diastolic: rng.gen_range(70..=90),
            },
            DeviceKind::Scale => Measurement::Weight {
                kg: rng.gen_range(50.0..=120.0),
            },
        };
        tracing::debug!(device = kind.label(), ?measurement, "simulated acquisition");
        Ok(measurement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn simulated_values_stay_in_range() {
        let devices = SimulatedDevices::new().with_settle_delay(Duration::from_millis(10));
        match devices.acquire(DeviceKind::Oximeter).await.unwrap() {
            Measurement::Oximeter { pulse_bpm, spo2_pct } => {
                assert!((60..=100).contains(&pulse_bpm));
                assert!((95..=100).contains(&spo2_pct));
            }
            other => panic!("wrong measurement kind: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_failure_rate_always_errors() {
        let devices = SimulatedDevices::new()
            .with_settle_delay(Duration::from_millis(1))
            .with_failure_rate(1.0);
        assert!(devices.acquire(DeviceKind::Scale).await.is_err());
    }

    #[test]
    fn cycle_order_maps_to_distinct_stages() {
        let stages: Vec<_> = DeviceKind::CYCLE_ORDER
            .iter()
            .flat_map(|k| [k.intro_stage(), k.reading_stage(), k.done_stage()])
            .collect();
        assert_eq!(stages.len(), 9);
        for (i, a) in stages.iter().enumerate() {
            for b in &stages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
