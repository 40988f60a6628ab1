use std::fmt::Display;

use crate::error::Error;
use crate::models::{CycleStatus, EnrollmentStatus, SessionStatus, WeekStatus};

/// Shared protocol of the four state machines. Transition sets are explicit
/// so validity never depends on history; self-transitions are always
/// invalid and terminal states have no outgoing edges.
pub trait StateMachine: Copy + Eq + Display + Sized {
    const MACHINE: &'static str;

    fn can_transition_to(self, target: Self) -> bool;

    fn transition_to(self, target: Self) -> Result<Self, Error> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::InvalidTransition {
                machine: Self::MACHINE,
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }

    fn is_terminal(self) -> bool;
}

impl StateMachine for EnrollmentStatus {
    const MACHINE: &'static str = "enrollment";

    fn can_transition_to(self, target: Self) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, target),
            (Active, BetweenCycles) | (Active, Quit) | (BetweenCycles, Active) | (BetweenCycles, Quit)
        )
    }

    fn is_terminal(self) -> bool {
        self == EnrollmentStatus::Quit
    }
}

impl StateMachine for CycleStatus {
    const MACHINE: &'static str = "cycle";

    fn can_transition_to(self, target: Self) -> bool {
        use CycleStatus::*;
        // COMPLETED -> PENDING resets the machine for the next cycle.
        matches!(
            (self, target),
            (Pending, InProgress) | (InProgress, Completed) | (Completed, Pending)
        )
    }

    fn is_terminal(self) -> bool {
        false
    }
}

impl StateMachine for WeekStatus {
    const MACHINE: &'static str = "week";

    fn can_transition_to(self, target: Self) -> bool {
        use WeekStatus::*;
        matches!(
            (self, target),
            (Pending, InProgress) | (InProgress, Completed) | (Completed, Pending)
        )
    }

    fn is_terminal(self) -> bool {
        false
    }
}

impl StateMachine for SessionStatus {
    const MACHINE: &'static str = "workout";

    fn can_transition_to(self, target: Self) -> bool {
        use SessionStatus::*;
        matches!(
            (self, target),
            (InProgress, Completed) | (InProgress, Abandoned)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}
