//! Self-healing supervision of long-lived daemon components.

mod config;
mod runner;
mod traits;
mod types;

pub use config::SupervisorConfig;
pub use runner::{HealthHandle, Supervisor};
pub use traits::{ManagedComponent, SpawnedComponent};
pub use types::{ComponentHealth, ComponentPhase};
