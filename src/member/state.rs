//! Transfer progress
//!
//! Only `Committed` makes the debit and credit visible to other
//! transactions; every other state ends in `RolledBack`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    /// Transaction begun, nothing written yet
    Started,

    /// Source debited inside the transaction
    Debited,

    /// Target credited inside the transaction
    Credited,

    /// Terminal: both writes committed
    Committed,

    /// Terminal: all writes discarded
    RolledBack,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::RolledBack)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (*self, next) {
            (Started, Debited) | (Debited, Credited) | (Credited, Committed) => true,
            (Started | Debited | Credited, RolledBack) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Started => "STARTED",
            TransferState::Debited => "DEBITED",
            TransferState::Credited => "CREDITED",
            TransferState::Committed => "COMMITTED",
            TransferState::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TransferState::Committed.is_terminal());
        assert!(TransferState::RolledBack.is_terminal());

        assert!(!TransferState::Started.is_terminal());
        assert!(!TransferState::Debited.is_terminal());
        assert!(!TransferState::Credited.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(TransferState::Started.can_transition_to(TransferState::Debited));
        assert!(TransferState::Debited.can_transition_to(TransferState::Credited));
        assert!(TransferState::Credited.can_transition_to(TransferState::Committed));
    }

    #[test]
    fn test_rollback_reachable_until_terminal() {
        assert!(TransferState::Started.can_transition_to(TransferState::RolledBack));
        assert!(TransferState::Debited.can_transition_to(TransferState::RolledBack));
        assert!(TransferState::Credited.can_transition_to(TransferState::RolledBack));
        assert!(!TransferState::Committed.can_transition_to(TransferState::RolledBack));
    }

    #[test]
    fn test_no_skipping_steps() {
        assert!(!TransferState::Started.can_transition_to(TransferState::Credited));
        assert!(!TransferState::Started.can_transition_to(TransferState::Committed));
        assert!(!TransferState::Debited.can_transition_to(TransferState::Committed));
        assert!(!TransferState::RolledBack.can_transition_to(TransferState::Started));
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferState::Started.to_string(), "STARTED");
        assert_eq!(TransferState::RolledBack.to_string(), "ROLLED_BACK");
    }
}
