//! Dispatch ordering and queue positions

use std::cmp::Ordering;
use uuid::Uuid;

use crate::ticket::Ticket;

/// Order in which waiting tickets are called: highest score first, then earliest
/// issued, then lowest number.
pub fn dispatch_order(a: &Ticket, b: &Ticket) -> Ordering {
    b.priority_score
        .cmp(&a.priority_score)
        .then_with(|| a.issued_at.cmp(&b.issued_at))
        .then_with(|| a.ticket_number.cmp(&b.ticket_number))
}

pub fn sort_for_dispatch(tickets: &mut [Ticket]) {
    tickets.sort_by(dispatch_order);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionChange {
    pub ticket_id: Uuid,
    pub old_position: i32,
    pub new_position: i32,
}

impl PositionChange {
    /// True when the ticket moved from beyond `threshold` to within it.
    pub fn crossed_threshold(&self, threshold: i32) -> bool {
        self.new_position <= threshold && self.old_position > threshold
    }
}

/// Number the waiting tickets 1..N in dispatch order and report the ones whose
/// stored position differs.
pub fn assign_positions(waiting: &[Ticket]) -> Vec<PositionChange> {
    let mut ordered: Vec<&Ticket> = waiting.iter().filter(|t| t.status.is_waiting()).collect();
    ordered.sort_by(|a, b| dispatch_order(a, b));

    ordered
        .into_iter()
        .zip(1..)
        .filter(|(ticket, position)| ticket.queue_position != *position)
        .map(|(ticket, position)| PositionChange {
            ticket_id: ticket.id,
            old_position: ticket.queue_position,
            new_position: position,
        })
        .collect()
}

/// 1-based live position of `ticket_id` among `waiting`, if present.
pub fn live_position(waiting: &[Ticket], ticket_id: Uuid) -> Option<i32> {
    let mut ordered: Vec<&Ticket> = waiting.iter().filter(|t| t.status.is_waiting()).collect();
    ordered.sort_by(|a, b| dispatch_order(a, b));
    ordered
        .iter()
        .position(|t| t.id == ticket_id)
        .map(|idx| idx as i32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::Priority;
    use crate::ticket::fixtures::waiting_ticket;

    #[test]
    fn emergency_jumps_ahead_of_earlier_normal() {
        let normal = waiting_ticket(Priority::Normal, 50, "2024-03-01T10:00:00Z");
        let emergency = waiting_ticket(Priority::Emergency, 100, "2024-03-01T10:05:00Z");
        let mut tickets = vec![normal.clone(), emergency.clone()];
        sort_for_dispatch(&mut tickets);
        assert_eq!(tickets[0].id, emergency.id);
    }

    #[test]
    fn equal_scores_fall_back_to_arrival() {
        let late = waiting_ticket(Priority::Normal, 50, "2024-03-01T10:01:00Z");
        let early = waiting_ticket(Priority::Normal, 50, "2024-03-01T10:00:00Z");
        let mut tickets = vec![late, early.clone()];
        sort_for_dispatch(&mut tickets);
        assert_eq!(tickets[0].id, early.id);
    }

    #[test]
    fn positions_only_report_changes() {
        let mut a = waiting_ticket(Priority::Normal, 50, "2024-03-01T10:00:00Z");
        let mut b = waiting_ticket(Priority::Normal, 50, "2024-03-01T10:01:00Z");
        let mut c = waiting_ticket(Priority::Normal, 50, "2024-03-01T10:02:00Z");
        a.queue_position = 1;
        b.queue_position = 3;
        c.queue_position = 4;

        let changes = assign_positions(&[c.clone(), a.clone(), b.clone()]);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].ticket_id, b.id);
        assert_eq!(changes[0].new_position, 2);
        assert!(changes[0].crossed_threshold(2));
        assert_eq!(changes[1].ticket_id, c.id);
        assert_eq!(changes[1].new_position, 3);
        assert!(!changes[1].crossed_threshold(2));

        assert_eq!(live_position(&[a, b, c.clone()], c.id), Some(3));
    }
}
