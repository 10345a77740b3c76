//! Batch correlation: groups related alerts from the merged detector stream
//! into higher-level findings. Rules are stateless across calls and ignore
//! `source_module`; a finding may combine alerts from several detectors.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::config::HubConfig;
use crate::error::HubError;
use crate::events::{Alert, AttackStage, CorrelatedFinding, Severity};

#[derive(Debug, Default)]
pub struct CorrelationOutcome {
    pub findings: Vec<CorrelatedFinding>,
    /// Alerts skipped by individual rule matchers during this pass.
    pub rule_errors: usize,
}

pub struct CorrelationEngine {
    auth_failure: Regex,
    privilege_keywords: Vec<String>,
    connection: Regex,
    transfer: Regex,
    failed_attempts: usize,
    window: Duration,
    connection_threshold: usize,
    max_match_len: usize,
}

impl CorrelationEngine {
    /// Compiles the configured signatures once. Invalid patterns are a
    /// fatal configuration error.
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        config.validate()?;

        let compile = |name: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| HubError::Config(format!("{}: {}", name, e)))
        };

        Ok(Self {
            auth_failure: compile("brute_force.signature", &config.brute_force.signature)?,
            privilege_keywords: config
                .privilege_escalation
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            connection: compile(
                "lateral_movement.signature",
                &config.lateral_movement.signature,
            )?,
            transfer: compile("exfiltration.signature", &config.exfiltration.signature)?,
            failed_attempts: config.brute_force.failed_attempts,
            window: Duration::seconds(config.brute_force.time_window_secs),
            connection_threshold: config.lateral_movement.connection_threshold,
            max_match_len: config.max_match_len,
        })
    }

    /// Runs every rule over the batch. A matcher failure on one alert skips
    /// that alert for that rule and is counted; the pass never aborts.
    pub fn correlate(&self, alerts: &[Alert]) -> CorrelationOutcome {
        let mut outcome = CorrelationOutcome::default();

        if let Some(finding) = self.brute_force(alerts, &mut outcome.rule_errors) {
            outcome.findings.push(finding);
        }
        if let Some(finding) = self.privilege_escalation(alerts, &mut outcome.rule_errors) {
            outcome.findings.push(finding);
        }
        if let Some(finding) = self.lateral_movement(alerts, &mut outcome.rule_errors) {
            outcome.findings.push(finding);
        }
        if let Some(finding) = self.exfiltration(alerts, &mut outcome.rule_errors) {
            outcome.findings.push(finding);
        }

        if !outcome.findings.is_empty() {
            log::info!(
                "Correlated {} alerts into {} findings ({} rule errors)",
                alerts.len(),
                outcome.findings.len(),
                outcome.rule_errors
            );
        }

        outcome
    }

    /// Lowercased match text for one alert: threat type, description, and
    /// any string-valued extra fields. Oversized descriptions are refused so
    /// a single pathological alert cannot stall the whole pass.
    fn haystack(&self, alert: &Alert) -> Result<String, HubError> {
        if alert.description.len() > self.max_match_len {
            return Err(HubError::RuleMatch {
                rule: "haystack".to_string(),
                reason: format!(
                    "description of alert {} exceeds {} bytes",
                    alert.id, self.max_match_len
                ),
            });
        }

        let mut text = String::with_capacity(alert.threat_type.len() + alert.description.len() + 1);
        text.push_str(&alert.threat_type);
        text.push(' ');
        text.push_str(&alert.description);
        for value in alert.extra.values() {
            if let Some(s) = value.as_str() {
                text.push(' ');
                text.push_str(s);
            }
        }
        Ok(text.to_lowercase())
    }

    /// Alerts in batch order whose match text satisfies `matches`.
    fn matching<'a>(
        &self,
        alerts: &'a [Alert],
        errors: &mut usize,
        matches: impl Fn(&str) -> bool,
    ) -> Vec<&'a Alert> {
        let mut hits = Vec::new();
        for alert in alerts {
            match self.haystack(alert) {
                Ok(text) => {
                    if matches(&text) {
                        hits.push(alert);
                    }
                }
                Err(e) => {
                    log::warn!("Rule matcher skipped alert {}: {}", alert.id, e);
                    *errors += 1;
                }
            }
        }
        hits
    }

    /// Repeated authentication failures inside the sliding time window.
    fn brute_force(&self, alerts: &[Alert], errors: &mut usize) -> Option<CorrelatedFinding> {
        let matched = self.matching(alerts, errors, |text| self.auth_failure.is_match(text));

        // Window ends at the newest matching alert.
        let newest = matched.iter().map(|a| a.created_at).max()?;
        let members: Vec<&Alert> = matched
            .into_iter()
            .filter(|a| newest - a.created_at <= self.window)
            .collect();

        if members.len() < self.failed_attempts {
            return None;
        }

        Some(self.finding(
            "Brute Force Attack",
            Severity::High,
            &members,
            vec![AttackStage::Recon, AttackStage::BruteForce, AttackStage::Access],
            "5 minutes",
            &format!("Detected {} failed authentication attempts", members.len()),
        ))
    }

    /// Any alert mentioning a privilege keyword.
    fn privilege_escalation(
        &self,
        alerts: &[Alert],
        errors: &mut usize,
    ) -> Option<CorrelatedFinding> {
        let members = self.matching(alerts, errors, |text| {
            self.privilege_keywords.iter().any(|kw| text.contains(kw))
        });

        if members.is_empty() {
            return None;
        }

        Some(self.finding(
            "Privilege Escalation Attempt",
            Severity::Critical,
            &members,
            vec![
                AttackStage::Access,
                AttackStage::PrivilegeEscalation,
                AttackStage::LateralMovement,
            ],
            "Recent",
            &format!("Detected {} privilege escalation attempts", members.len()),
        ))
    }

    /// Enough connection-flavored alerts to suggest host hopping.
    fn lateral_movement(&self, alerts: &[Alert], errors: &mut usize) -> Option<CorrelatedFinding> {
        let members = self.matching(alerts, errors, |text| self.connection.is_match(text));

        if members.len() < self.connection_threshold {
            return None;
        }

        Some(self.finding(
            "Lateral Movement",
            Severity::High,
            &members,
            vec![
                AttackStage::Access,
                AttackStage::LateralMovement,
                AttackStage::Persistence,
            ],
            "Last hour",
            &format!("Detected {} suspicious network connections", members.len()),
        ))
    }

    /// Any alert mentioning a bulk transfer or download.
    fn exfiltration(&self, alerts: &[Alert], errors: &mut usize) -> Option<CorrelatedFinding> {
        let members = self.matching(alerts, errors, |text| self.transfer.is_match(text));

        if members.is_empty() {
            return None;
        }

        Some(self.finding(
            "Potential Data Exfiltration",
            Severity::Critical,
            &members,
            vec![
                AttackStage::Access,
                AttackStage::Exfiltration,
                AttackStage::Cleanup,
            ],
            "Last 30 minutes",
            &format!("Detected {} large data transfers", members.len()),
        ))
    }

    fn finding(
        &self,
        pattern_type: &str,
        severity: Severity,
        members: &[&Alert],
        attack_chain: Vec<AttackStage>,
        span_label: &str,
        description: &str,
    ) -> CorrelatedFinding {
        let ids: Vec<Uuid> = members.iter().map(|a| a.id).collect();
        let times: Vec<DateTime<Utc>> = members.iter().map(|a| a.created_at).collect();

        CorrelatedFinding {
            pattern_type: pattern_type.to_string(),
            severity,
            event_count: ids.len(),
            member_alert_ids: ids,
            attack_chain,
            time_span: describe_span(&times, span_label),
            description: description.to_string(),
        }
    }
}

/// Human-readable window covered by the member alerts. Falls back to the
/// rule's descriptive label when the batch carries no measurable spread.
fn describe_span(times: &[DateTime<Utc>], fallback: &str) -> String {
    let min = times.iter().min();
    let max = times.iter().max();
    match (min, max) {
        (Some(min), Some(max)) => {
            let secs = (*max - *min).num_seconds();
            if secs <= 0 {
                fallback.to_string()
            } else if secs < 60 {
                format!("{} seconds", secs)
            } else if secs < 3600 {
                format!("{} minutes", secs / 60)
            } else {
                format!("{} hours", secs / 3600)
            }
        }
        _ => fallback.to_string(),
    }
}
