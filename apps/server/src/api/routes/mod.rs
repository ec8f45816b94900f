//! API route definitions

pub mod metrics;
pub mod queue;
