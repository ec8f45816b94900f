//! Queue services
//!
//! Each service is a cheap-to-clone handle over a shared [`QueueContext`]. Handlers
//! talk to services; services are the only code that mutates tickets and counters.

pub mod analytics;
pub mod balancer;
pub mod counters;
pub mod dispatch;
pub mod display;
pub mod estimator;
pub mod issuance;
pub mod notifier;
pub mod queue_config;
pub mod status;

pub use analytics::AnalyticsService;
pub use balancer::LoadBalancer;
pub use counters::CounterService;
pub use dispatch::{CallNextOutcome, DispatchService};
pub use display::{DisplayService, DisplaySnapshot, ServingEntry};
pub use estimator::WaitEstimator;
pub use issuance::IssuanceService;
pub use notifier::{LoggingNotifier, NotificationDispatcher, PositionNotice, QueueNotifier};
pub use queue_config::QueueConfigService;
pub use status::{QueueStatusSummary, ServiceQueueStatus, StatusService, TicketStatusView};

use chrono::{DateTime, NaiveDate, Utc};
use medqueue_core::{CalendarScope, Clock};
use std::sync::Arc;

use crate::config::QueueSettings;
use crate::db::QueueStore;

/// Dependencies shared by every queue service.
#[derive(Debug, Clone)]
pub struct QueueContext {
    pub store: Arc<dyn QueueStore>,
    pub clock: Arc<dyn Clock>,
    pub settings: QueueSettings,
}

/// Local calendar day containing an instant, with its UTC bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueueContext {
    pub fn new(
        store: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn scope(&self) -> CalendarScope {
        self.settings.calendar_scope()
    }

    pub fn day_window(&self, now: DateTime<Utc>) -> DayWindow {
        let scope = self.scope();
        let day = scope.day_of(now);
        let (start, end) = scope.day_bounds(day);
        DayWindow { day, start, end }
    }

    pub fn today(&self) -> DayWindow {
        self.day_window(self.now())
    }
}
