//! courtwatch daemon, health monitor and command line.

pub mod api;
pub mod cli;
pub mod daemon;
pub mod metrics;
pub mod state;
