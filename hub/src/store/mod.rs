pub mod alerts;
pub mod incidents;

pub use alerts::{AlertStore, ModuleCounts, SeverityCounts};
pub use incidents::{IncidentStore, ValidationMode};
