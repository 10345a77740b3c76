use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::HubError;
use crate::events::{Incident, IncidentStatus, IncidentUpdate, NewIncident, Severity};

/// How `create` treats missing required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Fill dashboard defaults (the reference behavior).
    #[default]
    Lenient,
    /// Reject creation without a title.
    Strict,
}

/// Mutable incident collection. Append/mutate only; incidents are never
/// deleted, only archived by status. Safe to share across threads: ids come
/// from an atomic counter, mutations take the write lock, reads snapshot.
pub struct IncidentStore {
    inner: RwLock<Vec<Incident>>,
    next_id: AtomicU64,
    mode: ValidationMode,
}

impl Default for IncidentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IncidentStore {
    pub fn new() -> Self {
        Self::with_mode(ValidationMode::Lenient)
    }

    pub fn with_mode(mode: ValidationMode) -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            mode,
        }
    }

    /// Seeds the store with previously persisted incidents. The id counter
    /// resumes past the highest seen id so later creates stay unique.
    pub fn preload(&self, mut incidents: Vec<Incident>) {
        incidents.sort_by_key(|i| i.id);
        let max_id = incidents.last().map(|i| i.id).unwrap_or(0);
        let mut inner = self.inner.write();
        inner.extend(incidents);
        self.next_id.fetch_max(max_id, Ordering::SeqCst);
    }

    /// Opens a new incident. Ids are unique and strictly increasing for the
    /// lifetime of the store, including under concurrent callers.
    pub fn create(&self, request: NewIncident) -> Result<Incident, HubError> {
        let title = match request.title.filter(|t| !t.trim().is_empty()) {
            Some(title) => title,
            None if self.mode == ValidationMode::Strict => {
                return Err(HubError::Validation(
                    "incident title is required".to_string(),
                ));
            }
            None => "Unknown Incident".to_string(),
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let incident = Incident {
            id,
            threat_ids: request.threat_ids,
            title,
            severity: request.severity.unwrap_or(Severity::Medium),
            status: IncidentStatus::Open,
            assigned_to: request.assigned_to.unwrap_or_else(|| "Unassigned".to_string()),
            notes: request.notes.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write();
        inner.push(incident.clone());
        log::info!("Opened incident #{}: {}", incident.id, incident.title);
        Ok(incident)
    }

    /// Merges the provided fields into an existing incident and bumps
    /// `updated_at`. `id` and `created_at` are not touchable. A backward
    /// status transition (other than Resolved -> Open) is rejected before
    /// anything is mutated.
    pub fn update(&self, id: u64, update: IncidentUpdate) -> Result<Incident, HubError> {
        let mut inner = self.inner.write();
        let incident = inner
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(HubError::NotFound { id })?;

        if let Some(status) = update.status {
            if !incident.status.can_transition_to(status) {
                return Err(HubError::Validation(format!(
                    "illegal status transition {} -> {}",
                    incident.status, status
                )));
            }
        }

        if let Some(threat_ids) = update.threat_ids {
            incident.threat_ids = threat_ids;
        }
        if let Some(title) = update.title {
            incident.title = title;
        }
        if let Some(severity) = update.severity {
            incident.severity = severity;
        }
        if let Some(status) = update.status {
            incident.status = status;
        }
        if let Some(assigned_to) = update.assigned_to {
            incident.assigned_to = assigned_to;
        }
        if let Some(notes) = update.notes {
            incident.notes = notes;
        }
        incident.updated_at = Utc::now();

        Ok(incident.clone())
    }

    pub fn get(&self, id: u64) -> Option<Incident> {
        self.inner.read().iter().find(|i| i.id == id).cloned()
    }

    /// All incidents in creation order, optionally filtered by status.
    pub fn list(&self, status: Option<IncidentStatus>) -> Vec<Incident> {
        let inner = self.inner.read();
        match status {
            None => inner.clone(),
            Some(status) => inner.iter().filter(|i| i.status == status).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> NewIncident {
        NewIncident {
            title: Some(title.to_string()),
            ..NewIncident::default()
        }
    }

    #[test]
    fn create_fills_lenient_defaults() {
        let store = IncidentStore::new();
        let incident = store.create(NewIncident::default()).unwrap();
        assert_eq!(incident.id, 1);
        assert_eq!(incident.title, "Unknown Incident");
        assert_eq!(incident.severity, Severity::Medium);
        assert_eq!(incident.status, IncidentStatus::Open);
        assert_eq!(incident.assigned_to, "Unassigned");
        assert!(incident.threat_ids.is_empty());
        assert_eq!(incident.created_at, incident.updated_at);
    }

    #[test]
    fn strict_mode_requires_a_title() {
        let store = IncidentStore::with_mode(ValidationMode::Strict);
        assert!(matches!(
            store.create(NewIncident::default()),
            Err(HubError::Validation(_))
        ));
        assert!(store.create(titled("Suspicious login burst")).is_ok());
        // The failed create must not burn an id.
        assert_eq!(store.list(None).len(), 1);
    }

    #[test]
    fn ids_are_sequential() {
        let store = IncidentStore::new();
        for expected in 1..=5u64 {
            let incident = store.create(titled("x")).unwrap();
            assert_eq!(incident.id, expected);
        }
    }

    #[test]
    fn update_merges_and_bumps_updated_at() {
        let store = IncidentStore::new();
        let created = store
            .create(NewIncident {
                title: Some("X".to_string()),
                severity: Some(Severity::High),
                ..NewIncident::default()
            })
            .unwrap();

        let updated = store
            .update(
                created.id,
                IncidentUpdate {
                    status: Some(IncidentStatus::Resolved),
                    ..IncidentUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(updated.status, IncidentStatus::Resolved);
        assert_eq!(updated.title, "X");
        assert_eq!(updated.severity, Severity::High);
        assert!(updated.updated_at > updated.created_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn update_missing_id_is_not_found_and_mutates_nothing() {
        let store = IncidentStore::new();
        let created = store.create(titled("only one")).unwrap();

        let result = store.update(
            99,
            IncidentUpdate {
                title: Some("ghost".to_string()),
                ..IncidentUpdate::default()
            },
        );
        assert!(matches!(result, Err(HubError::NotFound { id: 99 })));

        let after = store.get(created.id).unwrap();
        assert_eq!(after.title, "only one");
        assert_eq!(after.updated_at, created.updated_at);
    }

    #[test]
    fn backward_transition_is_rejected_without_mutation() {
        let store = IncidentStore::new();
        let incident = store.create(titled("x")).unwrap();
        store
            .update(
                incident.id,
                IncidentUpdate {
                    status: Some(IncidentStatus::Closed),
                    ..IncidentUpdate::default()
                },
            )
            .unwrap();

        let result = store.update(
            incident.id,
            IncidentUpdate {
                status: Some(IncidentStatus::Open),
                title: Some("should not apply".to_string()),
                ..IncidentUpdate::default()
            },
        );
        assert!(matches!(result, Err(HubError::Validation(_))));
        assert_eq!(store.get(incident.id).unwrap().title, "x");
    }

    #[test]
    fn resolved_incidents_can_reopen() {
        let store = IncidentStore::new();
        let incident = store.create(titled("x")).unwrap();
        for status in [IncidentStatus::Resolved, IncidentStatus::Open] {
            store
                .update(
                    incident.id,
                    IncidentUpdate {
                        status: Some(status),
                        ..IncidentUpdate::default()
                    },
                )
                .unwrap();
        }
        assert_eq!(store.get(incident.id).unwrap().status, IncidentStatus::Open);
    }

    #[test]
    fn list_filters_by_status_in_creation_order() {
        let store = IncidentStore::new();
        for title in ["a", "b", "c"] {
            store.create(titled(title)).unwrap();
        }
        store
            .update(
                2,
                IncidentUpdate {
                    status: Some(IncidentStatus::InProgress),
                    ..IncidentUpdate::default()
                },
            )
            .unwrap();

        let open = store.list(Some(IncidentStatus::Open));
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].title, "a");
        assert_eq!(open[1].title, "c");
        assert_eq!(store.list(None).len(), 3);
    }

    #[test]
    fn preload_resumes_id_sequence() {
        let store = IncidentStore::new();
        let seeded = store.create(titled("seed")).unwrap();

        let other = IncidentStore::new();
        other.preload(vec![seeded]);
        let next = other.create(titled("next")).unwrap();
        assert_eq!(next.id, 2);
    }
}
