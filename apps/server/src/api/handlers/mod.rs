//! Request handlers for API endpoints
//!
//! Handlers extract and validate input, call one service and shape the response.
//! Errors convert through `crate::Error`'s `IntoResponse`.

pub mod admin;
pub mod counters;
pub mod display;
pub mod metrics;
pub mod tickets;

pub use admin::*;
pub use counters::*;
pub use display::*;
pub use metrics::*;
pub use tickets::*;
