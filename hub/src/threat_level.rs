//! Platform-wide threat level. Two historical policies coexist and the
//! caller picks the one matching its population; they are intentionally not
//! unified. Note the asymmetry: the count-based policy tops out at HIGH and
//! can never return CRITICAL, while the severity-based policy can.

use crate::events::{Alert, Incident, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatLevelPolicy {
    /// Raw alert totals: 0 -> LOW, 1-4 -> MEDIUM, >=5 -> HIGH.
    CountBased,
    /// Severity population: any CRITICAL -> CRITICAL, more than two HIGH ->
    /// HIGH, at least one HIGH -> MEDIUM, otherwise LOW.
    SeverityBased,
}

/// Aggregate threat level for the current alert/incident population under
/// the selected policy.
pub fn level(policy: ThreatLevelPolicy, alerts: &[Alert], incidents: &[Incident]) -> Severity {
    match policy {
        ThreatLevelPolicy::CountBased => by_count(alerts.len()),
        ThreatLevelPolicy::SeverityBased => by_severity(
            alerts
                .iter()
                .map(|a| a.severity)
                .chain(incidents.iter().map(|i| i.severity)),
        ),
    }
}

pub fn by_count(total: usize) -> Severity {
    if total == 0 {
        Severity::Low
    } else if total < 5 {
        Severity::Medium
    } else {
        Severity::High
    }
}

pub fn by_severity(severities: impl IntoIterator<Item = Severity>) -> Severity {
    let mut critical = 0usize;
    let mut high = 0usize;
    for severity in severities {
        match severity {
            Severity::Critical => critical += 1,
            Severity::High => high += 1,
            _ => {}
        }
    }

    if critical > 0 {
        Severity::Critical
    } else if high > 2 {
        Severity::High
    } else if high > 0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SourceModule;

    fn alert(severity: Severity) -> Alert {
        Alert::new(SourceModule::LogAnalyzer, "Log Entry", severity, "test")
    }

    #[test]
    fn count_policy_boundaries() {
        assert_eq!(by_count(0), Severity::Low);
        assert_eq!(by_count(1), Severity::Medium);
        assert_eq!(by_count(4), Severity::Medium);
        assert_eq!(by_count(5), Severity::High);
        assert_eq!(by_count(500), Severity::High);
    }

    #[test]
    fn count_policy_is_monotonic_and_never_critical() {
        let mut previous = Severity::Low;
        for total in 0..64 {
            let current = by_count(total);
            assert!(current >= previous);
            assert!(current < Severity::Critical);
            previous = current;
        }
    }

    #[test]
    fn severity_policy_critical_iff_critical_member() {
        assert_eq!(
            by_severity(vec![Severity::Low, Severity::Critical]),
            Severity::Critical
        );
        assert_ne!(
            by_severity(vec![Severity::High, Severity::High, Severity::Medium]),
            Severity::Critical
        );
    }

    #[test]
    fn severity_policy_high_counts() {
        assert_eq!(by_severity(vec![Severity::High; 3]), Severity::High);
        assert_eq!(by_severity(vec![Severity::High; 2]), Severity::Medium);
        assert_eq!(by_severity(vec![Severity::High]), Severity::Medium);
        assert_eq!(
            by_severity(vec![Severity::Low, Severity::Medium]),
            Severity::Low
        );
        assert_eq!(by_severity(Vec::new()), Severity::Low);
    }

    #[test]
    fn policies_are_selected_not_mixed() {
        // Five critical alerts: count policy still says HIGH, severity
        // policy says CRITICAL.
        let alerts: Vec<Alert> = (0..5).map(|_| alert(Severity::Critical)).collect();
        assert_eq!(
            level(ThreatLevelPolicy::CountBased, &alerts, &[]),
            Severity::High
        );
        assert_eq!(
            level(ThreatLevelPolicy::SeverityBased, &alerts, &[]),
            Severity::Critical
        );
    }

    #[test]
    fn empty_population_is_low_under_both_policies() {
        assert_eq!(level(ThreatLevelPolicy::CountBased, &[], &[]), Severity::Low);
        assert_eq!(
            level(ThreatLevelPolicy::SeverityBased, &[], &[]),
            Severity::Low
        );
    }
}
