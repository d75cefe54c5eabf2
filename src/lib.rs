pub mod error;
pub mod monitor;
pub mod params;
pub mod rate_generator;
pub mod simulation;
pub mod state_snapshot;
pub mod types;

mod delay_line;
mod neuron;
mod partition;
mod plasticity;
mod synapse;
mod util;
mod wiring;
