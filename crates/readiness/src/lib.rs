//! PressReady core
//!
//! Runs the DTF print-readiness checks against an uploaded design, packages the
//! outcome into a report and keeps a small, capped history of reports in an
//! injected key-value store.

pub mod evaluator;
pub mod history;
pub mod intake;
pub mod report;

pub use evaluator::{evaluate, CheckResult, CheckStatus, Evaluation};
pub use history::{FileStore, HistoryConfig, HistoryStore, KeyValueStore, MemoryStore};
pub use intake::{CheckInput, FileFormat, PrintConfig, ShirtColor};
pub use report::Report;
