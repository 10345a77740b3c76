use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::alert::Severity;

/// Incident lifecycle state. Transitions only move forward, with the single
/// exception of reopening a resolved incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IncidentStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "Open",
            IncidentStatus::InProgress => "InProgress",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::Closed => "Closed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IncidentStatus::Open => 0,
            IncidentStatus::InProgress => 1,
            IncidentStatus::Resolved => 2,
            IncidentStatus::Closed => 3,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: IncidentStatus) -> bool {
        if *self == IncidentStatus::Resolved && next == IncidentStatus::Open {
            return true; // reopen
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(IncidentStatus::Open),
            "InProgress" => Ok(IncidentStatus::InProgress),
            "Resolved" => Ok(IncidentStatus::Resolved),
            "Closed" => Ok(IncidentStatus::Closed),
            other => Err(format!("unknown incident status: {}", other)),
        }
    }
}

/// A tracked unit of investigation referencing alerts/findings by id.
///
/// `id` and `created_at` are fixed at creation; `updated_at` is bumped on
/// every mutation. Incidents are never deleted, only moved through statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: u64,
    pub threat_ids: Vec<Uuid>,
    pub title: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub assigned_to: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation request. Missing fields are filled with the dashboard defaults
/// in lenient mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewIncident {
    #[serde(default)]
    pub threat_ids: Vec<Uuid>,
    pub title: Option<String>,
    pub severity: Option<Severity>,
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. Absent fields are left untouched; `id` and `created_at`
/// are not representable here and therefore cannot be changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentUpdate {
    pub threat_ids: Option<Vec<Uuid>>,
    pub title: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<IncidentStatus>,
    pub assigned_to: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_allowed() {
        assert!(IncidentStatus::Open.can_transition_to(IncidentStatus::InProgress));
        assert!(IncidentStatus::InProgress.can_transition_to(IncidentStatus::Resolved));
        assert!(IncidentStatus::Resolved.can_transition_to(IncidentStatus::Closed));
        assert!(IncidentStatus::Open.can_transition_to(IncidentStatus::Open));
    }

    #[test]
    fn reopen_is_the_only_backward_transition() {
        assert!(IncidentStatus::Resolved.can_transition_to(IncidentStatus::Open));
        assert!(!IncidentStatus::Closed.can_transition_to(IncidentStatus::Open));
        assert!(!IncidentStatus::InProgress.can_transition_to(IncidentStatus::Open));
        assert!(!IncidentStatus::Resolved.can_transition_to(IncidentStatus::InProgress));
    }

    #[test]
    fn status_tokens_are_case_sensitive() {
        assert!(IncidentStatus::from_str("Open").is_ok());
        assert!(IncidentStatus::from_str("open").is_err());
        assert_eq!(
            serde_json::to_string(&IncidentStatus::InProgress).unwrap(),
            "\"InProgress\""
        );
    }
}
