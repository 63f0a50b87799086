//! Multi-layer marking automation.
//!
//! [`LayerAutomation`] drives one layer through open, parameter update,
//! download, start, status polling and stop. [`run_job`] owns layer
//! advancement and calls it once per layer.

mod layer;
mod policy;
mod runner;
mod state;

#[cfg(test)]
mod tests;

pub use layer::{LayerAutomation, LayerReport};
pub use policy::PollPolicy;
pub use runner::{JobProgress, JobReport, run_job};
pub use state::LayerState;
