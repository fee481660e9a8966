//! Simulation orchestration for the Agora market
//!
//! Ties the pieces together: one shared directory, a set of producer
//! and consumer agents each ticking on its own interval, and channels
//! collecting the stock reports and purchase notifications the agents
//! emit while the simulation runs.

pub mod simulation;

pub use simulation::{Simulation, SimulationConfig, SimulationResults};
