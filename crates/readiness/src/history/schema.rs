//! Stored history schema and migrations
//!
//! The current layout is a versioned document under [`HISTORY_KEY`]:
//!
//! ```json
//! { "version": 2, "reports": [ /* Report, newest first */ ] }
//! ```
//!
//! Older builds left three other shapes behind, each under its own key:
//! - [`LEGACY_SNAPSHOT_KEY`]: a single v0 report object (`pass|warning|error`)
//! - [`LEGACY_HISTORY_KEY`]: an array of v1 entries wrapping `reportData`
//!   (`PASS|WARN|FAIL`)
//! - [`LEGACY_CARDS_KEY`]: an array of v1 card entries with nested `inputs`
//!   (`Pass|Warning|Error`)
//!
//! Every step below is a pure function. An entry that fails a step is dropped;
//! a step never fails the whole payload.

use crate::evaluator::{CheckResult, CheckStatus};
use crate::intake::{PrintConfig, ShirtColor};
use crate::report::Report;
use chrono::{DateTime, Utc};
use pressready_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const HISTORY_KEY: &str = "pressready.history";
pub const SCHEMA_VERSION: u32 = 2;

pub const LEGACY_SNAPSHOT_KEY: &str = "pressready_report_v1";
pub const LEGACY_HISTORY_KEY: &str = "pressready.history.v1";
pub const LEGACY_CARDS_KEY: &str = "pressready_history_v1";

/// Title given to legacy results that were stored without one
const UNTITLED_CHECK: &str = "Check";

/// Current on-disk document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDocument {
    pub version: u32,
    pub reports: Vec<Report>,
}

impl HistoryDocument {
    pub fn new(reports: Vec<Report>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            reports,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reports recovered from a stored document
#[derive(Debug, Default)]
pub struct DecodedDocument {
    pub reports: Vec<Report>,

    /// Entries that were present but unreadable
    pub dropped: usize,
}

/// Decode the current document.
///
/// Fails when the payload is not JSON, not a document or carries a version
/// this build does not understand. Individual malformed reports are dropped.
pub fn decode_document(raw: &str) -> Result<DecodedDocument> {
    let value: Value = serde_json::from_str(raw)?;

    let version = value
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::Storage("history document has no version".to_string()))?;
    if version != u64::from(SCHEMA_VERSION) {
        return Err(Error::Storage(format!(
            "unsupported history schema version {}",
            version
        )));
    }

    let entries = value
        .get("reports")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Storage("history document has no reports".to_string()))?;

    let mut decoded = DecodedDocument::default();
    for entry in entries {
        match serde_json::from_value::<Report>(entry.clone()) {
            Ok(report) if is_well_formed(&report) => decoded.reports.push(report.rederive()),
            Ok(_) => decoded.dropped += 1,
            Err(e) => {
                debug!("Dropping unreadable report: {}", e);
                decoded.dropped += 1;
            }
        }
    }

    Ok(decoded)
}

fn is_well_formed(report: &Report) -> bool {
    !report.id.trim().is_empty() && !report.file_name.trim().is_empty()
}

// ---------------------------------------------------------------------------
// v0: single snapshot
// ---------------------------------------------------------------------------

/// Single report object written by the first release
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotV0 {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub file_name: Option<String>,
    pub image_width_px: Option<f64>,
    pub image_height_px: Option<f64>,
    pub print_width_in: Option<f64>,
    pub shirt_color: Option<String>,
    pub white_ink: Option<bool>,
    pub results: Option<Vec<LegacyResult>>,
}

/// Result row shared by the v0 snapshot and v1 entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub fix: Option<String>,
}

// ---------------------------------------------------------------------------
// v1: entries wrapping reportData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryV1 {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub generated_at: String,
    #[serde(default)]
    pub summary_text: Option<String>,
    pub report_data: ReportDataV1,
    #[serde(default)]
    pub thumb: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDataV1 {
    pub file_name: String,
    #[serde(default)]
    pub image_width_px: Option<f64>,
    #[serde(default)]
    pub image_height_px: Option<f64>,
    #[serde(default)]
    pub print_width_in: Option<f64>,
    #[serde(default)]
    pub shirt_color: Option<String>,
    #[serde(default)]
    pub white_ink: Option<bool>,
    #[serde(default)]
    pub results: Vec<LegacyResult>,
}

// ---------------------------------------------------------------------------
// v1 cards: entries with nested inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEntryV1 {
    pub id: String,
    pub created_at: String,
    pub file_name: String,
    #[serde(default)]
    pub inputs: CardInputsV1,
    #[serde(default)]
    pub results: Vec<ResultCardV1>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInputsV1 {
    pub print_width_in: Option<f64>,
    pub shirt_color: Option<String>,
    pub white_ink: Option<bool>,
    pub image_width_px: Option<f64>,
    pub image_height_px: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultCardV1 {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
}

// ---------------------------------------------------------------------------
// Migration steps
// ---------------------------------------------------------------------------

/// v0 snapshot → v1 entry.
///
/// The snapshot must name its file, its creation time and carry a results
/// array; everything else falls back to the defaults the first release used.
pub fn snapshot_v0_to_v1(snapshot: SnapshotV0) -> Option<EntryV1> {
    let file_name = snapshot.file_name.filter(|f| !f.trim().is_empty())?;
    let created_at = snapshot.created_at.filter(|c| !c.trim().is_empty())?;
    let results = snapshot.results?;

    let id = snapshot
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("legacy-{}", created_at));

    Some(EntryV1 {
        id,
        title: Some(file_name.clone()),
        status: None,
        generated_at: created_at,
        summary_text: None,
        report_data: ReportDataV1 {
            file_name,
            image_width_px: snapshot.image_width_px,
            image_height_px: snapshot.image_height_px,
            print_width_in: snapshot.print_width_in,
            shirt_color: snapshot.shirt_color,
            white_ink: snapshot.white_ink,
            results,
        },
        thumb: None,
    })
}

/// v1 entry → current report
pub fn entry_v1_to_report(entry: EntryV1) -> Option<Report> {
    if entry.id.trim().is_empty() || entry.report_data.file_name.trim().is_empty() {
        return None;
    }
    let created_at = parse_timestamp(&entry.generated_at)?;
    let data = entry.report_data;

    let results = data
        .results
        .into_iter()
        .map(|r| CheckResult {
            title: r.title.unwrap_or_else(|| UNTITLED_CHECK.to_string()),
            status: parse_legacy_status(r.status.as_deref()),
            message: r.detail.unwrap_or_default(),
            suggestion: r.fix.filter(|f| !f.is_empty()),
        })
        .collect();

    Some(Report::assemble(
        entry.id,
        created_at,
        data.file_name,
        to_px(data.image_width_px),
        to_px(data.image_height_px),
        legacy_print_config(data.print_width_in, data.shirt_color, data.white_ink),
        results,
    ))
}

/// v1 card entry → current report
pub fn card_v1_to_report(entry: CardEntryV1) -> Option<Report> {
    if entry.id.trim().is_empty() || entry.file_name.trim().is_empty() {
        return None;
    }
    let created_at = parse_timestamp(&entry.created_at)?;
    let inputs = entry.inputs;

    let results = entry
        .results
        .into_iter()
        .map(|r| CheckResult {
            title: r.title.unwrap_or_else(|| UNTITLED_CHECK.to_string()),
            status: parse_legacy_status(r.status.as_deref()),
            message: r.message.unwrap_or_default(),
            suggestion: r.suggestion.filter(|s| !s.is_empty()),
        })
        .collect();

    Some(Report::assemble(
        entry.id,
        created_at,
        entry.file_name,
        to_px(inputs.image_width_px),
        to_px(inputs.image_height_px),
        legacy_print_config(inputs.print_width_in, inputs.shirt_color, inputs.white_ink),
        results,
    ))
}

// ---------------------------------------------------------------------------
// Payload decoders
// ---------------------------------------------------------------------------

/// Decode a v0 snapshot payload through the full chain
pub fn decode_snapshot_v0(raw: &str) -> Option<Report> {
    let snapshot: SnapshotV0 = serde_json::from_str(raw)
        .map_err(|e| debug!("Unreadable v0 snapshot: {}", e))
        .ok()?;
    snapshot_v0_to_v1(snapshot).and_then(entry_v1_to_report)
}

/// Decode a v1 entries payload, dropping entries that do not migrate
pub fn decode_entries_v1(raw: &str) -> Vec<Report> {
    decode_array(raw)
        .into_iter()
        .filter_map(|value| serde_json::from_value::<EntryV1>(value).ok())
        .filter_map(entry_v1_to_report)
        .collect()
}

/// Decode a v1 cards payload, dropping entries that do not migrate
pub fn decode_cards_v1(raw: &str) -> Vec<Report> {
    decode_array(raw)
        .into_iter()
        .filter_map(|value| serde_json::from_value::<CardEntryV1>(value).ok())
        .filter_map(card_v1_to_report)
        .collect()
}

fn decode_array(raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            debug!("Legacy history payload is not an array");
            Vec::new()
        }
        Err(e) => {
            debug!("Unreadable legacy history payload: {}", e);
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Map any of the historical status spellings onto [`CheckStatus`].
/// Unknown or missing values count as a pass, as they always have.
pub fn parse_legacy_status(status: Option<&str>) -> CheckStatus {
    match status.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("error") | Some("fail") => CheckStatus::Error,
        Some("warning") | Some("warn") => CheckStatus::Warning,
        _ => CheckStatus::Pass,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| debug!("Unparseable legacy timestamp '{}': {}", raw, e))
        .ok()
}

fn to_px(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.round().min(f64::from(u32::MAX)) as u32,
        _ => 0,
    }
}

fn legacy_print_config(
    print_width_in: Option<f64>,
    shirt_color: Option<String>,
    white_ink: Option<bool>,
) -> PrintConfig {
    PrintConfig {
        print_width_in: print_width_in
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(0.0),
        shirt_color: shirt_color
            .and_then(|c| c.parse::<ShirtColor>().ok())
            .unwrap_or(ShirtColor::Dark),
        white_ink: white_ink.unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v0_payload() -> serde_json::Value {
        json!({
            "createdAt": "2025-02-10T14:00:00.000Z",
            "fileName": "old-logo.jpg",
            "imageWidthPx": 1800,
            "imageHeightPx": 900,
            "printWidthIn": 10,
            "shirtColor": "light",
            "whiteInk": false,
            "results": [
                {
                    "status": "warning",
                    "title": "Transparency check",
                    "detail": "JPG cannot be transparent.",
                    "fix": "Use PNG."
                },
                {
                    "status": "error",
                    "title": "Resolution (effective DPI)",
                    "detail": "Effective DPI: 180."
                },
                { "status": "pass" }
            ]
        })
    }

    #[test]
    fn test_snapshot_v0_to_v1_requires_core_fields() {
        let mut missing_name: SnapshotV0 = serde_json::from_value(v0_payload()).unwrap();
        missing_name.file_name = None;
        assert!(snapshot_v0_to_v1(missing_name).is_none());

        let mut missing_results: SnapshotV0 = serde_json::from_value(v0_payload()).unwrap();
        missing_results.results = None;
        assert!(snapshot_v0_to_v1(missing_results).is_none());

        let mut missing_time: SnapshotV0 = serde_json::from_value(v0_payload()).unwrap();
        missing_time.created_at = None;
        assert!(snapshot_v0_to_v1(missing_time).is_none());
    }

    #[test]
    fn test_snapshot_v0_to_v1_defaults_id() {
        let snapshot: SnapshotV0 = serde_json::from_value(v0_payload()).unwrap();
        let entry = snapshot_v0_to_v1(snapshot).unwrap();
        assert_eq!(entry.id, "legacy-2025-02-10T14:00:00.000Z");
        assert_eq!(entry.generated_at, "2025-02-10T14:00:00.000Z");
        assert_eq!(entry.report_data.results.len(), 3);
    }

    #[test]
    fn test_v0_full_chain() {
        let report = decode_snapshot_v0(&v0_payload().to_string()).unwrap();

        assert_eq!(report.file_name, "old-logo.jpg");
        assert_eq!(report.image_width_px, 1800);
        assert_eq!(report.print_width_in, 10.0);
        assert_eq!(report.shirt_color, ShirtColor::Light);
        assert!(!report.white_ink);
        assert_eq!(report.results[0].status, CheckStatus::Warning);
        assert_eq!(report.results[0].suggestion.as_deref(), Some("Use PNG."));
        assert_eq!(report.results[1].status, CheckStatus::Error);
        assert_eq!(report.results[2].title, "Check");
        assert_eq!(report.results[2].status, CheckStatus::Pass);
        assert_eq!(report.overall_status, CheckStatus::Error);
        assert!(report.summary_text.contains("File: old-logo.jpg"));
    }

    #[test]
    fn test_v0_defaults_for_missing_setup() {
        let raw = json!({
            "createdAt": "2025-02-10T14:00:00Z",
            "fileName": "bare.png",
            "results": []
        });
        let report = decode_snapshot_v0(&raw.to_string()).unwrap();
        assert_eq!(report.image_width_px, 0);
        assert_eq!(report.print_width_in, 0.0);
        assert_eq!(report.shirt_color, ShirtColor::Dark);
        assert!(report.white_ink);
        assert_eq!(report.overall_status, CheckStatus::Pass);
    }

    #[test]
    fn test_v0_garbage_is_none() {
        assert!(decode_snapshot_v0("{not json").is_none());
        assert!(decode_snapshot_v0("[1,2,3]").is_none());
    }

    #[test]
    fn test_entry_v1_to_report() {
        let entry: EntryV1 = serde_json::from_value(json!({
            "id": "abc",
            "title": "front.png",
            "status": "WARN",
            "generatedAt": "2025-04-01T08:00:00.000Z",
            "summaryText": "stale",
            "reportData": {
                "fileName": "front.png",
                "imageWidthPx": 2400,
                "imageHeightPx": 2400,
                "printWidthIn": 12,
                "shirtColor": "dark",
                "whiteInk": true,
                "results": [
                    { "status": "PASS", "title": "Transparency check" },
                    {
                        "status": "WARN",
                        "title": "Resolution (effective DPI)",
                        "detail": "Effective DPI: 200.",
                        "fix": "For stronger print sharpness, target 220+ DPI."
                    }
                ]
            }
        }))
        .unwrap();

        let report = entry_v1_to_report(entry).unwrap();
        assert_eq!(report.id, "abc");
        assert_eq!(report.overall_status, CheckStatus::Warning);
        assert_eq!(report.results[1].message, "Effective DPI: 200.");
        assert_ne!(report.summary_text, "stale");
    }

    #[test]
    fn test_entry_v1_rejects_bad_timestamp() {
        let entry = EntryV1 {
            id: "x".to_string(),
            title: None,
            status: None,
            generated_at: "yesterday".to_string(),
            summary_text: None,
            report_data: ReportDataV1 {
                file_name: "a.png".to_string(),
                ..ReportDataV1::default()
            },
            thumb: None,
        };
        assert!(entry_v1_to_report(entry).is_none());
    }

    #[test]
    fn test_card_v1_to_report() {
        let entry: CardEntryV1 = serde_json::from_value(json!({
            "id": "card-1",
            "createdAt": "2025-05-05T05:05:05.000Z",
            "fileName": "back.svg",
            "inputs": {
                "printWidthIn": 11,
                "shirtColor": "Dark",
                "whiteInk": false,
                "imageWidthPx": 3000,
                "imageHeightPx": 1000
            },
            "results": [
                {
                    "title": "Dark shirt + white ink",
                    "status": "Error",
                    "message": "High risk: no white ink.",
                    "suggestion": "Enable white ink for dark garments to preserve color vibrancy."
                }
            ]
        }))
        .unwrap();

        let report = card_v1_to_report(entry).unwrap();
        assert_eq!(report.shirt_color, ShirtColor::Dark);
        assert!(!report.white_ink);
        assert_eq!(report.image_width_px, 3000);
        assert_eq!(report.overall_status, CheckStatus::Error);
        assert!(report.results[0].suggestion.is_some());
    }

    #[test]
    fn test_decode_arrays_drop_malformed_entries() {
        let raw = json!([
            { "id": "ok", "createdAt": "2025-05-05T05:05:05Z", "fileName": "a.png", "results": [] },
            { "id": "no-name", "createdAt": "2025-05-05T05:05:05Z" },
            42,
            "text"
        ]);
        let reports = decode_cards_v1(&raw.to_string());
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, "ok");

        assert!(decode_entries_v1("{\"not\":\"array\"}").is_empty());
        assert!(decode_entries_v1("nonsense").is_empty());
    }

    #[test]
    fn test_legacy_status_spellings() {
        assert_eq!(parse_legacy_status(Some("FAIL")), CheckStatus::Error);
        assert_eq!(parse_legacy_status(Some("error")), CheckStatus::Error);
        assert_eq!(parse_legacy_status(Some("Warning")), CheckStatus::Warning);
        assert_eq!(parse_legacy_status(Some("WARN")), CheckStatus::Warning);
        assert_eq!(parse_legacy_status(Some("PASS")), CheckStatus::Pass);
        assert_eq!(parse_legacy_status(Some("??")), CheckStatus::Pass);
        assert_eq!(parse_legacy_status(None), CheckStatus::Pass);
    }

    #[test]
    fn test_decode_document_versions() {
        assert!(decode_document("[]").is_err());
        assert!(decode_document("{\"version\":1,\"reports\":[]}").is_err());
        assert!(decode_document("{\"version\":2}").is_err());
        assert!(decode_document("{{{").is_err());

        let decoded = decode_document("{\"version\":2,\"reports\":[{\"id\":\"bad\"}]}").unwrap();
        assert!(decoded.reports.is_empty());
        assert_eq!(decoded.dropped, 1);
    }
}
