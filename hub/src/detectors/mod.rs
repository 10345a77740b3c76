//! Detector adapters. Each adapter turns raw input into stamped alerts and
//! never fails the scan as a whole: malformed records are skipped and
//! counted, internal failures become a synthetic error alert.

pub mod logs;
pub mod malware;
pub mod network;

pub use logs::LogAnalyzer;
pub use malware::MalwareDetector;
pub use network::{heuristic_scorer, AnomalyScorer, FlowFeatures, NetworkIds};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::events::{Alert, Severity, SourceModule};

/// Counters for a single scan invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub records_seen: usize,
    pub alerts_emitted: usize,
    /// Malformed records skipped during this scan.
    pub errors: usize,
    pub last_scan: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub alerts: Vec<Alert>,
    pub stats: ScanStats,
}

/// Cumulative counters over the adapter's lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdapterTotals {
    pub records_processed: u64,
    pub alerts_emitted: u64,
}

/// Raw scan input. Adapters that expect structured records will parse each
/// line of a `Lines` input as JSON, counting failures as malformed records.
#[derive(Debug, Clone)]
pub enum ScanInput {
    Lines(Vec<String>),
    Records(Vec<Value>),
}

impl ScanInput {
    /// View as text lines. Structured records are rendered back to JSON.
    pub(crate) fn as_lines(&self) -> Vec<String> {
        match self {
            ScanInput::Lines(lines) => lines.clone(),
            ScanInput::Records(records) => records.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// View as structured records. Returns parsed values plus the number of
    /// lines that were not valid JSON.
    pub(crate) fn as_records(&self) -> (Vec<Value>, usize) {
        match self {
            ScanInput::Records(records) => (records.clone(), 0),
            ScanInput::Lines(lines) => {
                let mut records = Vec::new();
                let mut errors = 0;
                for line in lines {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str(line) {
                        Ok(value) => records.push(value),
                        Err(_) => errors += 1,
                    }
                }
                (records, errors)
            }
        }
    }
}

/// A threat detector. Implementations must stamp `source_module` and
/// `created_at` on every alert and must not fail on malformed input.
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;
    fn module(&self) -> SourceModule;
    fn scan(&self, input: &ScanInput) -> ScanResult;
    fn totals(&self) -> AdapterTotals;
}

/// Fallback alert for an internal adapter failure, mirroring the dashboard's
/// convention of reporting detector trouble as a MEDIUM alert instead of
/// propagating an error.
pub fn error_alert(module: SourceModule, detector_name: &str, message: &str) -> Alert {
    Alert::new(
        module,
        &format!("{} Error", detector_name),
        Severity::Medium,
        &format!("Error during scan: {}", message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_parse_to_records_with_error_count() {
        let input = ScanInput::Lines(vec![
            "{\"packet_rate\": 10}".to_string(),
            "not json".to_string(),
            "".to_string(),
            "{\"byte_rate\": 2}".to_string(),
        ]);
        let (records, errors) = input.as_records();
        assert_eq!(records.len(), 2);
        assert_eq!(errors, 1);
    }

    #[test]
    fn error_alert_is_medium_and_stamped() {
        let alert = error_alert(SourceModule::NetworkIds, "Network IDS", "boom");
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.source_module, SourceModule::NetworkIds);
        assert_eq!(alert.threat_type, "Network IDS Error");
    }
}
