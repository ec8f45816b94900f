//! Server-side models around the queue domain types

pub mod announcement;
pub mod display_board;
pub mod queue_config;
pub mod requests;
pub mod ticket;

pub use announcement::{Announcement, AnnouncementStatus};
pub use display_board::DisplayBoard;
pub use queue_config::QueueConfig;
pub use ticket::{AnalyticsQuery, ClaimOutcome, ClaimRequest, TicketDraft, TicketOrder, TicketQuery};
pub use requests::{
    normalize_phone, AnalyticsParams, AnnouncementParams, CallNextRequest, CancelTicketRequest,
    CreateCounterRequest, CreateDisplayBoardRequest, DisplayParams, IssueTicketRequest,
    QueueConfigRequest, ServiceTypeParams, TicketLookupParams, TransferTicketRequest,
    UpdateCounterRequest,
};
