use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{error_alert, AdapterTotals, Detector, ScanInput, ScanResult, ScanStats};
use crate::config::NetworkConfig;
use crate::events::{Alert, Severity, SourceModule};

/// Flow-level features extracted from network traffic. Feature extraction
/// itself happens upstream; the adapter only consumes records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowFeatures {
    #[serde(default)]
    pub packet_rate: f64,
    #[serde(default)]
    pub byte_rate: f64,
    #[serde(default)]
    pub flow_duration: f64,
    #[serde(default)]
    pub unique_ports: f64,
    #[serde(default)]
    pub protocol_variety: f64,
}

/// Pluggable anomaly scoring strategy. Real deployments inject a trained
/// model here; the engine only requires a score in [0, 1].
pub type AnomalyScorer = Arc<dyn Fn(&FlowFeatures) -> f64 + Send + Sync>;

/// Deterministic stand-in scorer: saturating weighted sum of the flow
/// features, biased toward port scans and short noisy flows.
pub fn heuristic_scorer() -> AnomalyScorer {
    Arc::new(|f: &FlowFeatures| {
        let rate = (f.packet_rate / 1000.0).min(1.0);
        let bytes = (f.byte_rate / 1_000_000.0).min(1.0);
        let ports = (f.unique_ports / 50.0).min(1.0);
        let proto = (f.protocol_variety / 5.0).min(1.0);
        let burst = if f.flow_duration < 1.0 && f.packet_rate > 100.0 {
            0.2
        } else {
            0.0
        };
        (0.35 * rate + 0.2 * bytes + 0.3 * ports + 0.15 * proto + burst).min(1.0)
    })
}

/// Network intrusion detection adapter.
pub struct NetworkIds {
    config: NetworkConfig,
    scorer: AnomalyScorer,
    packets_processed: AtomicU64,
    anomalies_detected: AtomicU64,
}

impl NetworkIds {
    pub fn new(config: NetworkConfig, scorer: AnomalyScorer) -> Self {
        Self {
            config,
            scorer,
            packets_processed: AtomicU64::new(0),
            anomalies_detected: AtomicU64::new(0),
        }
    }

    pub fn with_heuristic_scorer(config: NetworkConfig) -> Self {
        Self::new(config, heuristic_scorer())
    }

    fn severity_for_score(&self, score: f64) -> Severity {
        if score >= self.config.critical_score {
            Severity::Critical
        } else if score >= self.config.high_score {
            Severity::High
        } else if score >= self.config.medium_score {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl Detector for NetworkIds {
    fn name(&self) -> &str {
        "Network IDS"
    }

    fn module(&self) -> SourceModule {
        SourceModule::NetworkIds
    }

    fn scan(&self, input: &ScanInput) -> ScanResult {
        let (records, parse_errors) = input.as_records();
        let mut stats = ScanStats {
            records_seen: records.len() + parse_errors,
            errors: parse_errors,
            ..ScanStats::default()
        };
        let mut alerts = Vec::new();

        for (flow_id, record) in records.into_iter().enumerate() {
            let features: FlowFeatures = match serde_json::from_value(record) {
                Ok(features) => features,
                Err(e) => {
                    log::debug!("Skipping malformed flow record: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };

            let score = (self.scorer)(&features);
            if !score.is_finite() {
                alerts.push(error_alert(
                    self.module(),
                    self.name(),
                    "anomaly scorer returned a non-finite score",
                ));
                stats.errors += 1;
                continue;
            }

            if score > self.config.detection_threshold {
                let alert = Alert::new(
                    self.module(),
                    "Network Anomaly",
                    self.severity_for_score(score),
                    &format!(
                        "Anomalous network pattern detected: {:.1}% confidence",
                        score * 100.0
                    ),
                )
                .with_extra("anomaly_score", json!(score))
                .with_extra("flow_id", json!(flow_id));
                alerts.push(alert);
            }
        }

        stats.alerts_emitted = alerts.len();
        stats.last_scan = Some(chrono::Utc::now());
        self.packets_processed
            .fetch_add(stats.records_seen as u64, Ordering::Relaxed);
        self.anomalies_detected
            .fetch_add(alerts.len() as u64, Ordering::Relaxed);

        ScanResult { alerts, stats }
    }

    fn totals(&self) -> AdapterTotals {
        AdapterTotals {
            records_processed: self.packets_processed.load(Ordering::Relaxed),
            alerts_emitted: self.anomalies_detected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;

    fn fixed_scorer(score: f64) -> AnomalyScorer {
        Arc::new(move |_| score)
    }

    fn ids_with_score(score: f64) -> NetworkIds {
        NetworkIds::new(HubConfig::default().network, fixed_scorer(score))
    }

    #[test]
    fn severity_bands_match_reference_thresholds() {
        let ids = ids_with_score(0.0);
        assert_eq!(ids.severity_for_score(0.95), Severity::Critical);
        assert_eq!(ids.severity_for_score(0.8), Severity::High);
        assert_eq!(ids.severity_for_score(0.65), Severity::Medium);
        assert_eq!(ids.severity_for_score(0.5), Severity::Low);
    }

    #[test]
    fn scores_below_threshold_stay_silent() {
        let ids = ids_with_score(0.5);
        let result = ids.scan(&ScanInput::Records(vec![json!({"packet_rate": 10.0})]));
        assert!(result.alerts.is_empty());
        assert_eq!(result.stats.records_seen, 1);
        assert_eq!(result.stats.errors, 0);
    }

    #[test]
    fn high_scores_emit_stamped_alerts() {
        let ids = ids_with_score(0.92);
        let result = ids.scan(&ScanInput::Records(vec![
            json!({"packet_rate": 500.0}),
            json!({"unique_ports": 60.0}),
        ]));
        assert_eq!(result.alerts.len(), 2);
        for alert in &result.alerts {
            assert_eq!(alert.source_module, SourceModule::NetworkIds);
            assert_eq!(alert.severity, Severity::Critical);
            assert_eq!(alert.extra["anomaly_score"], json!(0.92));
        }
        assert_eq!(result.alerts[1].extra["flow_id"], json!(1));
    }

    #[test]
    fn malformed_records_are_counted_not_fatal() {
        let ids = ids_with_score(0.92);
        let input = ScanInput::Lines(vec![
            "{\"packet_rate\": 1.0}".to_string(),
            "garbage".to_string(),
        ]);
        let result = ids.scan(&input);
        assert_eq!(result.stats.errors, 1);
        assert_eq!(result.alerts.len(), 1);
    }

    #[test]
    fn non_finite_score_becomes_error_alert() {
        let ids = ids_with_score(f64::NAN);
        let result = ids.scan(&ScanInput::Records(vec![json!({})]));
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].threat_type, "Network IDS Error");
        assert_eq!(result.alerts[0].severity, Severity::Medium);
        assert_eq!(result.stats.errors, 1);
    }

    #[test]
    fn cumulative_totals_accumulate() {
        let ids = ids_with_score(0.8);
        ids.scan(&ScanInput::Records(vec![json!({}), json!({})]));
        ids.scan(&ScanInput::Records(vec![json!({})]));
        let totals = ids.totals();
        assert_eq!(totals.records_processed, 3);
        assert_eq!(totals.alerts_emitted, 3);
    }
}
