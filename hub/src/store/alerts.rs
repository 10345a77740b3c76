use parking_lot::RwLock;
use serde::Serialize;

use crate::events::{Alert, Severity, SourceModule};

/// Per-module alert counts, matching the dashboard's stats breakdown.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ModuleCounts {
    pub network_alerts: usize,
    pub log_events: usize,
    pub malware_detections: usize,
}

impl ModuleCounts {
    pub fn total(&self) -> usize {
        self.network_alerts + self.log_events + self.malware_detections
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

/// Shared alert population. Created once at startup and handed out by
/// `Arc`; reads observe a consistent snapshot, writes are batch appends.
#[derive(Default)]
pub struct AlertStore {
    inner: RwLock<Vec<Alert>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&self, batch: Vec<Alert>) {
        if batch.is_empty() {
            return;
        }
        let mut alerts = self.inner.write();
        alerts.extend(batch);
    }

    /// All alerts, optionally filtered by producing module, in arrival order.
    pub fn list(&self, module: Option<SourceModule>) -> Vec<Alert> {
        let alerts = self.inner.read();
        match module {
            None => alerts.clone(),
            Some(module) => alerts
                .iter()
                .filter(|a| a.source_module == module)
                .cloned()
                .collect(),
        }
    }

    pub fn snapshot(&self) -> Vec<Alert> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn counts_by_module(&self) -> ModuleCounts {
        let alerts = self.inner.read();
        let mut counts = ModuleCounts::default();
        for alert in alerts.iter() {
            match alert.source_module {
                SourceModule::NetworkIds => counts.network_alerts += 1,
                SourceModule::LogAnalyzer => counts.log_events += 1,
                SourceModule::MalwareDetector => counts.malware_detections += 1,
            }
        }
        counts
    }

    pub fn counts_by_severity(&self) -> SeverityCounts {
        let alerts = self.inner.read();
        let mut counts = SeverityCounts::default();
        for alert in alerts.iter() {
            match alert.severity {
                Severity::Low => counts.low += 1,
                Severity::Medium => counts.medium += 1,
                Severity::High => counts.high += 1,
                Severity::Critical => counts.critical += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(module: SourceModule, severity: Severity) -> Alert {
        Alert::new(module, "test", severity, "test alert")
    }

    #[test]
    fn module_filter_and_counts() {
        let store = AlertStore::new();
        store.ingest(vec![
            alert(SourceModule::NetworkIds, Severity::High),
            alert(SourceModule::LogAnalyzer, Severity::Medium),
            alert(SourceModule::LogAnalyzer, Severity::Low),
        ]);

        assert_eq!(store.len(), 3);
        assert_eq!(store.list(Some(SourceModule::LogAnalyzer)).len(), 2);
        assert_eq!(store.list(Some(SourceModule::MalwareDetector)).len(), 0);
        assert_eq!(store.list(None).len(), 3);

        let counts = store.counts_by_module();
        assert_eq!(counts.network_alerts, 1);
        assert_eq!(counts.log_events, 2);
        assert_eq!(counts.total(), 3);

        let severities = store.counts_by_severity();
        assert_eq!(severities.high, 1);
        assert_eq!(severities.medium, 1);
        assert_eq!(severities.low, 1);
        assert_eq!(severities.critical, 0);
    }

    #[test]
    fn arrival_order_is_preserved() {
        let store = AlertStore::new();
        let first = alert(SourceModule::NetworkIds, Severity::Low);
        let second = alert(SourceModule::NetworkIds, Severity::High);
        let ids = vec![first.id, second.id];
        store.ingest(vec![first]);
        store.ingest(vec![second]);
        let listed: Vec<_> = store.list(None).iter().map(|a| a.id).collect();
        assert_eq!(listed, ids);
    }
}
