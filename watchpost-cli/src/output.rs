//! Output formatting for text vs JSON rendering
//!
//! All subcommand output flows through [`OutputWriter`]; handlers never
//! branch on the format themselves.

use std::io::Write;

use colored::{ColoredString, Colorize};
use serde::Serialize;
use watchpost_core::{ScanState, SessionState, Severity};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes payloads to stdout in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render a payload to `w`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

// ─── Shared Styling ──────────────────────────────────────────────────

pub fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("{severity:?}").to_uppercase();
    match severity {
        Severity::Fatal => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.normal(),
        Severity::Info => label.dimmed(),
    }
}

pub fn scan_state_label(state: ScanState) -> ColoredString {
    let label = state.to_string();
    match state {
        ScanState::Finished => label.green().bold(),
        ScanState::Failed => label.red().bold(),
        ScanState::Stopped => label.yellow().bold(),
        _ => label.normal(),
    }
}

pub fn session_state_label(state: SessionState) -> ColoredString {
    let label = state.to_string();
    match state {
        SessionState::Finished => label.green(),
        SessionState::Failed | SessionState::Aborted => label.red(),
        SessionState::Stopped | SessionState::Cancelled => label.yellow(),
        _ => label.normal(),
    }
}
