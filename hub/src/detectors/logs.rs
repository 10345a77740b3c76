use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;

use super::{AdapterTotals, Detector, ScanInput, ScanResult, ScanStats};
use crate::config::HubConfig;
use crate::error::HubError;
use crate::events::{Alert, Severity, SourceModule};

lazy_static! {
    // "Jan  5 03:21:09 host1 " syslog prefix. Stripped before keyword
    // matching so timestamps and hostnames cannot trip the signatures.
    static ref SYSLOG_PREFIX: Regex =
        Regex::new(r"^[A-Z][a-z]{2}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}\s+\S+\s+").unwrap();
}

/// Classifies raw log lines into alerts. One alert per suspicious line;
/// classes are checked in priority order so a line matching several
/// signatures keeps its most serious label. The full line rides in the
/// alert description, which is what the correlation rules match on.
pub struct LogAnalyzer {
    privilege_keywords: Vec<String>,
    auth_failure: Regex,
    transfer: Regex,
    connection: Regex,
    logs_processed: AtomicU64,
    alerts_emitted: AtomicU64,
}

impl LogAnalyzer {
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        let auth_failure = Regex::new(&config.brute_force.signature)
            .map_err(|e| HubError::Config(format!("brute_force.signature: {}", e)))?;
        let connection = Regex::new(&config.lateral_movement.signature)
            .map_err(|e| HubError::Config(format!("lateral_movement.signature: {}", e)))?;
        let transfer = Regex::new(&config.exfiltration.signature)
            .map_err(|e| HubError::Config(format!("exfiltration.signature: {}", e)))?;

        Ok(Self {
            privilege_keywords: config
                .privilege_escalation
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            auth_failure,
            transfer,
            connection,
            logs_processed: AtomicU64::new(0),
            alerts_emitted: AtomicU64::new(0),
        })
    }

    fn classify(&self, line: &str) -> Option<(&'static str, Severity)> {
        let line = SYSLOG_PREFIX.replace(line, "");
        let lower = line.to_lowercase();
        if self.privilege_keywords.iter().any(|kw| lower.contains(kw)) {
            return Some(("Privileged Activity", Severity::High));
        }
        if self.transfer.is_match(&line) {
            return Some(("Data Transfer", Severity::High));
        }
        if self.auth_failure.is_match(&line) {
            return Some(("Authentication Failure", Severity::Medium));
        }
        if self.connection.is_match(&line) {
            return Some(("Network Connection", Severity::Low));
        }
        None
    }
}

impl Detector for LogAnalyzer {
    fn name(&self) -> &str {
        "Log Analyzer"
    }

    fn module(&self) -> SourceModule {
        SourceModule::LogAnalyzer
    }

    fn scan(&self, input: &ScanInput) -> ScanResult {
        let mut stats = ScanStats::default();
        let mut alerts = Vec::new();

        for (line_no, line) in input.as_lines().into_iter().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.records_seen += 1;

            if let Some((threat_type, severity)) = self.classify(line) {
                let alert = Alert::new(self.module(), threat_type, severity, line)
                    .with_extra("line_no", json!(line_no));
                alerts.push(alert);
            }
        }

        stats.alerts_emitted = alerts.len();
        stats.last_scan = Some(chrono::Utc::now());
        self.logs_processed
            .fetch_add(stats.records_seen as u64, Ordering::Relaxed);
        self.alerts_emitted
            .fetch_add(alerts.len() as u64, Ordering::Relaxed);

        ScanResult { alerts, stats }
    }

    fn totals(&self) -> AdapterTotals {
        AdapterTotals {
            records_processed: self.logs_processed.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
        }
    }
}
