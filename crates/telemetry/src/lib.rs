pub mod store;
pub mod tracker;

pub use store::{FileTelemetryStore, InMemoryTelemetryStore, TelemetryStore};
pub use tracker::{OutcomeTracker, TelemetryAlert};
