use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Ordered threat severity. LOW < MEDIUM < HIGH < CRITICAL.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Severity {
    #[serde(rename = "LOW")]
    #[default]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Which detector produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceModule {
    #[serde(rename = "network_ids")]
    NetworkIds,
    #[serde(rename = "log_analyzer")]
    LogAnalyzer,
    #[serde(rename = "malware_detector")]
    MalwareDetector,
}

impl SourceModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceModule::NetworkIds => "network_ids",
            SourceModule::LogAnalyzer => "log_analyzer",
            SourceModule::MalwareDetector => "malware_detector",
        }
    }

    /// Parses the short query tokens the dashboard uses (`network`, `logs`,
    /// `malware`), as well as the full module names.
    pub fn from_query(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "network" | "network_ids" => Some(SourceModule::NetworkIds),
            "logs" | "log_analyzer" => Some(SourceModule::LogAnalyzer),
            "malware" | "malware_detector" => Some(SourceModule::MalwareDetector),
            _ => None,
        }
    }
}

impl fmt::Display for SourceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single raw finding emitted by one detector adapter.
///
/// `id`, `source_module`, and `created_at` are stamped at creation and never
/// change. Adapter-specific fields (anomaly_score, flow_id, ...) ride in
/// `extra` and are not interpreted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub source_module: SourceModule,
    pub threat_type: String,
    pub severity: Severity,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Alert {
    pub fn new(
        source_module: SourceModule,
        threat_type: &str,
        severity: Severity,
        description: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_module,
            threat_type: threat_type.to_string(),
            severity,
            description: description.to_string(),
            created_at: Utc::now(),
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) - {}",
            self.severity, self.threat_type, self.source_module, self.description
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_tokens_round_trip() {
        for sev in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let json = serde_json::to_string(&sev).unwrap();
            assert_eq!(json, format!("\"{}\"", sev.as_str()));
            let back: Severity = serde_json::from_str(&json).unwrap();
            assert_eq!(back, sev);
        }
    }

    #[test]
    fn module_query_tokens() {
        assert_eq!(
            SourceModule::from_query("network"),
            Some(SourceModule::NetworkIds)
        );
        assert_eq!(
            SourceModule::from_query("logs"),
            Some(SourceModule::LogAnalyzer)
        );
        assert_eq!(
            SourceModule::from_query("malware"),
            Some(SourceModule::MalwareDetector)
        );
        assert_eq!(SourceModule::from_query("bogus"), None);
    }

    #[test]
    fn extra_fields_flatten() {
        let alert = Alert::new(
            SourceModule::NetworkIds,
            "Network Anomaly",
            Severity::High,
            "test",
        )
        .with_extra("anomaly_score", serde_json::json!(0.91));

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["anomaly_score"], serde_json::json!(0.91));
        assert_eq!(json["source_module"], serde_json::json!("network_ids"));
    }
}
