use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::alert::Severity;

/// Attack-chain stage names attached to correlated findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackStage {
    #[serde(rename = "Recon")]
    Recon,
    #[serde(rename = "Access")]
    Access,
    #[serde(rename = "Brute Force")]
    BruteForce,
    #[serde(rename = "Privilege Escalation")]
    PrivilegeEscalation,
    #[serde(rename = "Lateral Movement")]
    LateralMovement,
    #[serde(rename = "Persistence")]
    Persistence,
    #[serde(rename = "Exfiltration")]
    Exfiltration,
    #[serde(rename = "Cleanup")]
    Cleanup,
}

impl AttackStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackStage::Recon => "Recon",
            AttackStage::Access => "Access",
            AttackStage::BruteForce => "Brute Force",
            AttackStage::PrivilegeEscalation => "Privilege Escalation",
            AttackStage::LateralMovement => "Lateral Movement",
            AttackStage::Persistence => "Persistence",
            AttackStage::Exfiltration => "Exfiltration",
            AttackStage::Cleanup => "Cleanup",
        }
    }
}

impl fmt::Display for AttackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A higher-level pattern derived from grouping related alerts within one
/// correlation batch. Recomputed per batch; never persisted incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedFinding {
    pub pattern_type: String,
    pub severity: Severity,
    /// Ids of the alerts that matched the rule. Always non-empty.
    pub member_alert_ids: Vec<Uuid>,
    pub event_count: usize,
    pub attack_chain: Vec<AttackStage>,
    pub time_span: String,
    pub description: String,
}

impl fmt::Display for CorrelatedFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {} ({} events over {})",
            self.severity, self.pattern_type, self.description, self.event_count, self.time_span
        )
    }
}
