//! Report records
//!
//! A report freezes one check run: the upload metadata, the print setup, the
//! ordered check results and two derived values, the overall status and a
//! plain-text summary that can be copied as-is.

use crate::evaluator::{overall_status, CheckResult, CheckStatus, Evaluation};
use crate::intake::{CheckInput, PrintConfig, ShirtColor};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// First line of every summary and export
pub const SUMMARY_HEADER: &str = "PressReady DTF Report";

/// Persisted outcome of a check run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
    pub image_width_px: u32,
    pub image_height_px: u32,
    pub print_width_in: f64,
    pub shirt_color: ShirtColor,
    pub white_ink: bool,
    pub results: Vec<CheckResult>,
    pub summary_text: String,
    pub overall_status: CheckStatus,
}

impl Report {
    /// Package an evaluation into a new report with a fresh id and timestamp
    pub fn new(input: &CheckInput, evaluation: Evaluation) -> Self {
        Self::assemble(
            Uuid::new_v4().to_string(),
            Utc::now(),
            input.file_name.clone(),
            input.image_width_px,
            input.image_height_px,
            input.print,
            evaluation.results,
        )
    }

    /// Build a report from its parts, deriving the overall status and summary
    pub fn assemble(
        id: String,
        created_at: DateTime<Utc>,
        file_name: String,
        image_width_px: u32,
        image_height_px: u32,
        print: PrintConfig,
        results: Vec<CheckResult>,
    ) -> Self {
        let mut report = Self {
            id,
            created_at,
            file_name,
            image_width_px,
            image_height_px,
            print_width_in: print.print_width_in,
            shirt_color: print.shirt_color,
            white_ink: print.white_ink,
            overall_status: overall_status(&results),
            results,
            summary_text: String::new(),
        };
        report.summary_text = report.render_summary();
        report
    }

    /// Print setup the report was produced with
    pub fn print_config(&self) -> PrintConfig {
        PrintConfig {
            print_width_in: self.print_width_in,
            shirt_color: self.shirt_color,
            white_ink: self.white_ink,
        }
    }

    /// Creation time as an ISO 8601 string with millisecond precision
    pub fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Recompute the derived fields from the stored results.
    ///
    /// Stored payloads are not trusted to keep them consistent.
    pub fn rederive(mut self) -> Self {
        self.overall_status = overall_status(&self.results);
        self.summary_text = self.render_summary();
        self
    }

    /// Header plus one `STATUS - Title: message (Fix: suggestion)` line per result
    pub fn render_summary(&self) -> String {
        let mut lines = vec![
            SUMMARY_HEADER.to_string(),
            format!("File: {}", self.file_name),
            format!("Generated: {}", self.created_at_iso()),
        ];

        for result in &self.results {
            let mut line = format!("{} - {}", result.status.label(), result.title);
            if !result.message.is_empty() {
                line.push_str(": ");
                line.push_str(&result.message);
            }
            if let Some(fix) = result.suggestion.as_deref().filter(|s| !s.is_empty()) {
                line.push_str(&format!(" (Fix: {})", fix));
            }
            lines.push(line);
        }

        lines.join("\n")
    }

    /// Printable export of the full report, the paid feature
    pub fn render_export(&self) -> String {
        let mut lines = vec![
            SUMMARY_HEADER.to_string(),
            format!("File: {}", self.file_name),
            format!("Generated: {}", self.created_at_iso()),
        ];

        if self.image_width_px > 0 && self.image_height_px > 0 {
            lines.push(format!(
                "Size: {}x{} px",
                self.image_width_px, self.image_height_px
            ));
        }
        if self.print_width_in > 0.0 {
            lines.push(format!("Print width: {} in", self.print_width_in));
        }
        lines.push(format!(
            "Shirt: {} | White ink: {}",
            self.shirt_color,
            if self.white_ink { "yes" } else { "no" }
        ));
        lines.push(format!("Overall: {}", self.overall_status.label()));
        lines.push(String::new());

        for result in &self.results {
            let detail = if result.message.is_empty() {
                result.title.clone()
            } else {
                format!("{}: {}", result.title, result.message)
            };
            let fix = match result.suggestion.as_deref() {
                Some(fix) if !fix.is_empty() => format!(" — Fix: {}", fix),
                _ => String::new(),
            };
            lines.push(format!("- {}: {}{}", result.status.label(), detail, fix));
        }

        lines.join("\n")
    }
}
