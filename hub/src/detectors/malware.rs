use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{AdapterTotals, Detector, ScanInput, ScanResult, ScanStats};
use crate::config::MalwareConfig;
use crate::error::HubError;
use crate::events::{Alert, Severity, SourceModule};

/// One scanned file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub sha256: String,
    #[serde(default)]
    pub entropy: Option<f64>,
}

/// Static malware checks: known-bad hash set, packed-binary entropy, and a
/// suspicious-extension pattern. Hash hits short-circuit the other checks.
pub struct MalwareDetector {
    known_bad: HashSet<String>,
    suspicious_extension: Regex,
    entropy_threshold: f64,
    files_scanned: AtomicU64,
    detections: AtomicU64,
}

impl MalwareDetector {
    pub fn new(config: &MalwareConfig) -> Result<Self, HubError> {
        let suspicious_extension = Regex::new(&config.suspicious_extension_pattern)
            .map_err(|e| HubError::Config(format!("malware.suspicious_extension_pattern: {}", e)))?;

        Ok(Self {
            known_bad: config
                .known_bad_hashes
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
            suspicious_extension,
            entropy_threshold: config.entropy_threshold,
            files_scanned: AtomicU64::new(0),
            detections: AtomicU64::new(0),
        })
    }

    fn check(&self, record: &FileRecord) -> Option<Alert> {
        if self.known_bad.contains(&record.sha256.to_lowercase()) {
            return Some(self.file_alert(
                record,
                "Known Malware Signature",
                Severity::Critical,
                &format!("File matches known malware hash: {}", record.path),
            ));
        }

        let suspicious_ext = self.suspicious_extension.is_match(&record.path);
        if let Some(entropy) = record.entropy {
            if suspicious_ext && entropy >= self.entropy_threshold {
                return Some(self.file_alert(
                    record,
                    "Packed Executable",
                    Severity::High,
                    &format!(
                        "High-entropy executable ({:.2} bits/byte): {}",
                        entropy, record.path
                    ),
                ));
            }
        }

        if suspicious_ext {
            return Some(self.file_alert(
                record,
                "Suspicious File Type",
                Severity::Medium,
                &format!("Executable content in scanned path: {}", record.path),
            ));
        }

        None
    }

    fn file_alert(
        &self,
        record: &FileRecord,
        threat_type: &str,
        severity: Severity,
        description: &str,
    ) -> Alert {
        Alert::new(self.module(), threat_type, severity, description)
            .with_extra("file_path", json!(record.path))
            .with_extra("sha256", json!(record.sha256))
    }
}

impl Detector for MalwareDetector {
    fn name(&self) -> &str {
        "Malware Detector"
    }

    fn module(&self) -> SourceModule {
        SourceModule::MalwareDetector
    }

    fn scan(&self, input: &ScanInput) -> ScanResult {
        let (records, parse_errors) = input.as_records();
        let mut stats = ScanStats {
            records_seen: records.len() + parse_errors,
            errors: parse_errors,
            ..ScanStats::default()
        };
        let mut alerts = Vec::new();

        for record in records {
            let record: FileRecord = match serde_json::from_value(record) {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("Skipping malformed file record: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };

            if let Some(alert) = self.check(&record) {
                alerts.push(alert);
            }
        }

        stats.alerts_emitted = alerts.len();
        stats.last_scan = Some(chrono::Utc::now());
        self.files_scanned
            .fetch_add(stats.records_seen as u64, Ordering::Relaxed);
        self.detections
            .fetch_add(alerts.len() as u64, Ordering::Relaxed);

        ScanResult { alerts, stats }
    }

    fn totals(&self) -> AdapterTotals {
        AdapterTotals {
            records_processed: self.files_scanned.load(Ordering::Relaxed),
            alerts_emitted: self.detections.load(Ordering::Relaxed),
        }
    }
}
