//! Transition tables shared by the RFQ, order and ticket machines.

use std::fmt;

use crate::ConsoleError;

/// A closed state enumeration with one transition table.
///
/// `next` is the whole table: every `(state, operation)` pair that is not
/// listed yields `None`, which callers report as an invalid transition.
pub trait Lifecycle: Copy + Eq + fmt::Display + Sized {
    type Operation: Copy + fmt::Display;

    fn next(self, operation: Self::Operation) -> Option<Self>;

    /// Table lookup that reports the attempted operation and current state.
    fn advance(self, operation: Self::Operation) -> Result<Self, ConsoleError> {
        self.next(operation)
            .ok_or_else(|| ConsoleError::invalid_transition(operation, self))
    }
}
