pub mod engine;

pub use engine::{CorrelationEngine, CorrelationOutcome};
