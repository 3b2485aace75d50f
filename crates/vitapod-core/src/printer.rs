//! **Receipt printer** — ESC/POS summary ticket for the user to take away.
//!
//! Writes raw command bytes straight to the printer device node (typically
//! `/dev/usb/lp0`). The kiosk runs fine without a printer; callers log print
//! failures and move on.

use crate::error::{CoreError, CoreResult};
use crate::session::Session;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Printable characters per line on the 80mm thermal roll.
const WIDTH: usize = 42;

const ESC_INIT: &[u8] = b"\x1b@";
const ESC_ALIGN_CENTER: &[u8] = b"\x1ba\x01";
const ESC_ALIGN_LEFT: &[u8] = b"\x1ba\x00";
const ESC_BOLD_ON: &[u8] = b"\x1bE\x01";
const ESC_BOLD_OFF: &[u8] = b"\x1bE\x00";
const GS_CUT: &[u8] = b"\x1dV\x42\x00";

const DISCLAIMER: &str = "This self-screening is not a medical diagnosis. \
If you are concerned about any of these results, please speak to a \
healthcare professional.";

pub struct ReceiptPrinter {
    device: PathBuf,
}

impl ReceiptPrinter {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Render and write the ticket for a completed session.
    pub fn print(&self, session: &Session) -> CoreResult<()> {
        let ticket = self.render(session);
        let mut device = OpenOptions::new()
            .write(true)
            .open(&self.device)
            .map_err(|e| CoreError::Printer(format!("{}: {}", self.device.display(), e)))?;
        device
            .write_all(&ticket)
            .map_err(|e| CoreError::Printer(format!("write failed: {}", e)))?;
        tracing::info!(device = %self.device.display(), "receipt printed");
        Ok(())
    }

    /// Full ESC/POS byte stream for one ticket.
    pub fn render(&self, session: &Session) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(ESC_INIT);

        out.extend_from_slice(ESC_ALIGN_CENTER);
        out.extend_from_slice(ESC_BOLD_ON);
        line(&mut out, "VITAPOD SELF-SCREENING");
        out.extend_from_slice(ESC_BOLD_OFF);
        line(&mut out, &chrono::Local::now().format("%Y-%m-%d %H:%M").to_string());
        line(&mut out, &"-".repeat(WIDTH));

        out.extend_from_slice(ESC_ALIGN_LEFT);
        row(&mut out, "Pulse", &format!("{} bpm", opt(session.readings.pulse_bpm)));
        row(&mut out, "Blood oxygen", &format!("{} %", opt(session.readings.spo2_pct)));
        row(&mut out, "Blood pressure", &format!("{} mmHg", session.readings.bp_text()));
        row(&mut out, "Weight", &format!("{} kg", session.readings.weight_text()));
        line(&mut out, &"-".repeat(WIDTH));

        row(&mut out, "Smoking", session.answer("q1"));
        row(&mut out, "Exercise", session.answer("q2"));
        row(&mut out, "Alcohol", session.answer("q3"));
        line(&mut out, &"-".repeat(WIDTH));

        for wrapped in wrap(DISCLAIMER, WIDTH) {
            line(&mut out, &wrapped);
        }
        line(&mut out, "");
        out.extend_from_slice(ESC_ALIGN_CENTER);
        line(&mut out, "Thank you for visiting.");
        line(&mut out, "");
        out.extend_from_slice(GS_CUT);
        out
    }
}

fn opt(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

fn line(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(text.as_bytes());
    out.push(b'\n');
}

/// Label left, value right, dot-padded to the full width. Values too long
/// to share the line get wrapped underneath instead.
fn row(out: &mut Vec<u8>, label: &str, value: &str) {
    if label.len() + value.len() + 1 > WIDTH {
        line(out, label);
        for wrapped in wrap(value, WIDTH - 2) {
            line(out, &format!("  {}", wrapped));
        }
        return;
    }
    let pad = WIDTH - label.len() - value.len();
    line(out, &format!("{}{}{}", label, ".".repeat(pad), value));
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
