use thiserror::Error;

use crate::ticket::TicketStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("ticket not in expected state: cannot {action} a ticket that is {from}")]
    InvalidTransition {
        from: TicketStatus,
        action: &'static str,
    },

    #[error("unknown priority category '{0}'")]
    InvalidPriority(String),

    #[error("unknown ticket status '{0}'")]
    InvalidStatus(String),

    #[error("invalid service type '{0}'")]
    InvalidServiceType(String),
}
