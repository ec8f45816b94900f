//! Walk-in queue domain model
//!
//! Pure building blocks for the ticketing and dispatch engine:
//! - Priority scoring and wait-time multipliers
//! - Dispatch ordering and queue position assignment
//! - Ticket lifecycle transitions
//! - Counter eligibility and least-loaded selection
//! - Token numbering and hourly analytics aggregation
//!
//! Nothing in this crate performs I/O. Persistence and concurrency control live in
//! the server crate, which feeds these functions with data read from its store.

#![forbid(unsafe_code)]

pub mod analytics;
pub mod clock;
pub mod counter;
pub mod error;
pub mod estimate;
pub mod numbering;
pub mod ordering;
pub mod priority;
pub mod ticket;
pub mod time;

pub use analytics::{compute_bucket, AnalyticsBucket, BucketKey, MinAvgMax};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{least_loaded, service_counter_type, Counter, CounterLoad};
pub use error::{Error, Result};
pub use estimate::{average_service_time, estimate_wait_minutes, WaitEstimateInput};
pub use numbering::{default_prefix, format_token, normalize_service_type, TokenFormat};
pub use ordering::{assign_positions, dispatch_order, live_position, sort_for_dispatch, PositionChange};
pub use priority::{priority_score, score_category, Priority, UrgencyLevel};
pub use ticket::{Ticket, TicketStatus};
pub use time::{round_minutes, CalendarScope};
