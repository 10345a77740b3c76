pub mod alert;
pub mod finding;
pub mod incident;

pub use alert::{Alert, Severity, SourceModule};
pub use finding::{AttackStage, CorrelatedFinding};
pub use incident::{Incident, IncidentStatus, IncidentUpdate, NewIncident};
