//! Check cycles: one pass over every source, and the periodic driver.

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{CycleError, CycleState, Orchestrator};
pub use scheduler::{shutdown_signal, CycleRunner, Scheduler};
