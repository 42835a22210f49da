//! Application systems

mod simulation;

pub use simulation::{SimulationSystem, SimulationTotals};
