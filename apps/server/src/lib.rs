//! medqueue - walk-in queue ticketing and dispatch server
//!
//! Issues numbered tickets per hospital and service type, orders waiting
//! patients by clinical priority, dispatches them to service counters and
//! feeds waiting-area displays, announcements and hourly analytics.

#![allow(
    clippy::too_many_arguments,      // Service constructors take their collaborators explicitly
    clippy::large_enum_variant,      // Claim outcomes carry a whole ticket
)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
