//! Readiness evaluator
//!
//! Four fixed heuristics that estimate whether a design will print cleanly
//! with DTF. The evaluator is a pure function of a validated [`CheckInput`].

use crate::intake::{CheckInput, ShirtColor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this effective DPI the print is expected to look blurry
pub const MIN_ACCEPTABLE_DPI: f64 = 150.0;

/// At or above this effective DPI the print is considered sharp
pub const TARGET_DPI: f64 = 220.0;

/// Narrower source images risk losing fine details
pub const DETAIL_MIN_WIDTH_PX: u32 = 2000;

pub const TRANSPARENCY_TITLE: &str = "Transparency check";
pub const RESOLUTION_TITLE: &str = "Resolution (effective DPI)";
pub const INK_SAFETY_TITLE: &str = "Dark shirt + white ink";
pub const DETAIL_RISK_TITLE: &str = "Small details risk";

/// Outcome of a single check, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

impl CheckStatus {
    /// Short uppercase label used in summaries and exports
    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warning => "WARN",
            CheckStatus::Error => "FAIL",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one readiness check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub title: String,
    pub status: CheckStatus,
    pub message: String,

    /// Remediation hint, present on every non-passing result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl CheckResult {
    fn pass(title: &str, message: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            status: CheckStatus::Pass,
            message: message.into(),
            suggestion: None,
        }
    }

    fn flagged(
        title: &str,
        status: CheckStatus,
        message: impl Into<String>,
        suggestion: &str,
    ) -> Self {
        Self {
            title: title.to_string(),
            status,
            message: message.into(),
            suggestion: Some(suggestion.to_string()),
        }
    }
}

/// Evaluator output
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Exactly four results: transparency, resolution, ink safety, detail risk
    pub results: Vec<CheckResult>,
    pub overall_status: CheckStatus,
    pub effective_dpi: f64,
}

/// Most severe status across results, `Pass` when there are none
pub fn overall_status(results: &[CheckResult]) -> CheckStatus {
    results
        .iter()
        .map(|r| r.status)
        .max()
        .unwrap_or(CheckStatus::Pass)
}

/// Pixels of source image per printed inch
pub fn effective_dpi(image_width_px: u32, print_width_in: f64) -> f64 {
    f64::from(image_width_px) / print_width_in
}

/// Status of the resolution check for a given effective DPI
pub fn resolution_status(dpi: f64) -> CheckStatus {
    if dpi < MIN_ACCEPTABLE_DPI {
        CheckStatus::Error
    } else if dpi < TARGET_DPI {
        CheckStatus::Warning
    } else {
        CheckStatus::Pass
    }
}

/// Run all readiness checks
pub fn evaluate(input: &CheckInput) -> Evaluation {
    let dpi = effective_dpi(input.image_width_px, input.print.print_width_in);

    let results = vec![
        transparency_check(input),
        resolution_check(dpi),
        ink_safety_check(input),
        detail_risk_check(input),
    ];

    Evaluation {
        overall_status: overall_status(&results),
        results,
        effective_dpi: dpi,
    }
}

fn transparency_check(input: &CheckInput) -> CheckResult {
    if input.format.supports_transparency() {
        CheckResult::pass(TRANSPARENCY_TITLE, "OK (Transparency supported).")
    } else {
        CheckResult::flagged(
            TRANSPARENCY_TITLE,
            CheckStatus::Warning,
            "JPG cannot be transparent.",
            "Use PNG or SVG if you need transparent background areas.",
        )
    }
}

fn resolution_check(dpi: f64) -> CheckResult {
    let message = format!("Effective DPI: {}.", dpi.round());

    match resolution_status(dpi) {
        CheckStatus::Error => CheckResult::flagged(
            RESOLUTION_TITLE,
            CheckStatus::Error,
            message,
            "Increase image pixel width or reduce print width to reach at least 220 DPI.",
        ),
        CheckStatus::Warning => CheckResult::flagged(
            RESOLUTION_TITLE,
            CheckStatus::Warning,
            message,
            "For stronger print sharpness, target 220+ DPI.",
        ),
        CheckStatus::Pass => CheckResult::pass(RESOLUTION_TITLE, message),
    }
}

fn ink_safety_check(input: &CheckInput) -> CheckResult {
    if input.print.shirt_color == ShirtColor::Dark && !input.print.white_ink {
        CheckResult::flagged(
            INK_SAFETY_TITLE,
            CheckStatus::Error,
            "High risk: no white ink.",
            "Enable white ink for dark garments to preserve color vibrancy.",
        )
    } else {
        CheckResult::pass(INK_SAFETY_TITLE, "Configuration looks safe for garment color.")
    }
}

fn detail_risk_check(input: &CheckInput) -> CheckResult {
    if input.image_width_px < DETAIL_MIN_WIDTH_PX {
        CheckResult::flagged(
            DETAIL_RISK_TITLE,
            CheckStatus::Warning,
            "May lose fine details when printed large.",
            "Use a wider source image to better preserve intricate elements.",
        )
    } else {
        CheckResult::pass(
            DETAIL_RISK_TITLE,
            "Pixel width is likely sufficient for finer details.",
        )
    }
}
