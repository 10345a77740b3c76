//! Threat Intelligence Hub engine: event model, detector adapters,
//! correlation rules, threat-level aggregation, and incident tracking.
//!
//! The HTTP dashboard that fronts this engine lives elsewhere; everything
//! here is consumed through plain function calls on store/engine handles.

pub mod config;
pub mod correlation;
pub mod detectors;
pub mod error;
pub mod events;
pub mod store;
pub mod threat_level;

pub use config::HubConfig;
pub use correlation::{CorrelationEngine, CorrelationOutcome};
pub use detectors::{Detector, ScanInput, ScanResult, ScanStats};
pub use error::HubError;
pub use events::{
    Alert, AttackStage, CorrelatedFinding, Incident, IncidentStatus, IncidentUpdate, NewIncident,
    Severity, SourceModule,
};
pub use store::{AlertStore, IncidentStore, ValidationMode};
pub use threat_level::ThreatLevelPolicy;
