//! Per-slot request sequencing.
//!
//! When a logical query is reissued before the previous one resolves, only
//! the response to the most recently issued ticket may be applied.

use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    slot: String,
    seq: u64,
}

impl Ticket {
    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: DashMap<String, u64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next ticket for `slot`, superseding every earlier one.
    pub fn issue(&self, slot: &str) -> Ticket {
        let mut latest = self.latest.entry(slot.to_string()).or_insert(0);
        *latest += 1;
        Ticket {
            slot: slot.to_string(),
            seq: *latest,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest
            .get(&ticket.slot)
            .is_some_and(|latest| *latest == ticket.seq)
    }

    /// Hands `value` back only if `ticket` is still the latest for its slot.
    pub fn accept<T>(&self, ticket: &Ticket, value: T) -> Option<T> {
        self.is_current(ticket).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_ticket_supersedes_earlier() {
        let seq = RequestSequencer::new();
        let first = seq.issue("inbox");
        let second = seq.issue("inbox");

        assert!(!seq.is_current(&first));
        assert!(seq.is_current(&second));
        assert_eq!(seq.accept(&first, "stale"), None);
        assert_eq!(seq.accept(&second, "fresh"), Some("fresh"));
    }

    #[test]
    fn slots_are_independent() {
        let seq = RequestSequencer::new();
        let friends = seq.issue("friends");
        let _inbox = seq.issue("inbox");
        let _inbox_again = seq.issue("inbox");

        assert!(seq.is_current(&friends));
        assert_eq!(friends.seq(), 1);
    }
}
