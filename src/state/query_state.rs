/// Query state definitions for tracking pagination progress
///
/// Every query descriptor walks `Pending -> Fetching -> (PageReceived -> Fetching | terminal)`.
/// A query can also end straight from `Pending` when the job stops before its first fetch.
use std::fmt;
use thiserror::Error;

/// Represents the current state of one query within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryState {
    // ===== Active States =====
    /// Query has not been started
    Pending,

    /// At least one page request is in flight
    Fetching,

    /// A page arrived and its repositories were offered to the accumulator
    PageReceived,

    // ===== Terminal States =====
    /// The platform reported no further pages
    Exhausted,

    /// The page safety ceiling stopped pagination
    PageLimitHit,

    /// The job target was reached while this query was running
    TargetReached,

    /// An unrecoverable error ended the query
    Errored,

    /// Shutdown stopped the query with pages still unfetched
    Interrupted,
}

/// Rejected state change
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invalid query state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: QueryState,
    pub to: QueryState,
}

impl QueryState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if the query may still fetch pages
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Fetching | Self::PageReceived)
    }

    /// Returns true if the query ran to a normal end
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Exhausted | Self::PageLimitHit | Self::TargetReached
        )
    }

    /// Checks whether `next` is a legal successor of this state
    ///
    /// Several workers share one query, so `Fetching` and `PageReceived`
    /// may repeat.
    pub fn can_transition_to(&self, next: QueryState) -> bool {
        use QueryState::*;
        match (self, next) {
            (Pending, Fetching) => true,
            (Fetching, Fetching | PageReceived) => true,
            (PageReceived, Fetching | PageReceived) => true,
            (from, to) => from.is_active() && to.is_terminal(),
        }
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition(self, next: QueryState) -> Result<QueryState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::PageReceived => "page_received",
            Self::Exhausted => "exhausted",
            Self::PageLimitHit => "page_limit_hit",
            Self::TargetReached => "target_reached",
            Self::Errored => "errored",
            Self::Interrupted => "interrupted",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetching" => Some(Self::Fetching),
            "page_received" => Some(Self::PageReceived),
            "exhausted" => Some(Self::Exhausted),
            "page_limit_hit" => Some(Self::PageLimitHit),
            "target_reached" => Some(Self::TargetReached),
            "errored" => Some(Self::Errored),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }

    /// Returns all possible query states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Fetching,
            Self::PageReceived,
            Self::Exhausted,
            Self::PageLimitHit,
            Self::TargetReached,
            Self::Errored,
            Self::Interrupted,
        ]
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!QueryState::Pending.is_terminal());
        assert!(!QueryState::Fetching.is_terminal());
        assert!(!QueryState::PageReceived.is_terminal());

        assert!(QueryState::Exhausted.is_terminal());
        assert!(QueryState::PageLimitHit.is_terminal());
        assert!(QueryState::TargetReached.is_terminal());
        assert!(QueryState::Errored.is_terminal());
        assert!(QueryState::Interrupted.is_terminal());
    }

    #[test]
    fn test_is_success() {
        assert!(QueryState::Exhausted.is_success());
        assert!(QueryState::TargetReached.is_success());
        assert!(!QueryState::Errored.is_success());
        assert!(!QueryState::Interrupted.is_success());
        assert!(!QueryState::Fetching.is_success());
    }

    #[test]
    fn test_happy_path_transitions() {
        let state = QueryState::Pending
            .transition(QueryState::Fetching)
            .and_then(|s| s.transition(QueryState::PageReceived))
            .and_then(|s| s.transition(QueryState::Fetching))
            .and_then(|s| s.transition(QueryState::Exhausted))
            .unwrap();

        assert_eq!(state, QueryState::Exhausted);
    }

    #[test]
    fn test_query_can_end_before_first_fetch() {
        for terminal in QueryState::all_states().into_iter().filter(|s| s.is_terminal()) {
            assert_eq!(QueryState::Pending.transition(terminal), Ok(terminal));
        }
        assert_eq!(
            QueryState::PageReceived.transition(QueryState::Interrupted),
            Ok(QueryState::Interrupted)
        );
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(
            QueryState::Pending.transition(QueryState::PageReceived),
            Err(InvalidTransition {
                from: QueryState::Pending,
                to: QueryState::PageReceived
            })
        );
        assert!(QueryState::Exhausted
            .transition(QueryState::Fetching)
            .is_err());
        assert!(QueryState::Errored.transition(QueryState::Errored).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        for from in QueryState::all_states().into_iter().filter(|s| s.is_terminal()) {
            for to in QueryState::all_states() {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_roundtrip_db_string() {
        for state in QueryState::all_states() {
            let parsed = QueryState::from_db_string(state.to_db_string());
            assert_eq!(Some(state), parsed, "Failed roundtrip for {:?}", state);
        }
        assert_eq!(QueryState::from_db_string("invalid"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", QueryState::PageLimitHit), "page_limit_hit");
    }
}
