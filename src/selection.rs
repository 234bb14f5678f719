//! Multi-select state and the two-phase confirmation protocol.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::store::Collection;
use crate::{ConsoleError, Result};

/// Selected record ids, in the order they were picked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn new() -> Self { Self::default() }

    pub fn ids(&self) -> &[String] { &self.ids }
    pub fn len(&self) -> usize { self.ids.len() }
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
    pub fn contains(&self, id: &str) -> bool { self.ids.iter().any(|i| i == id) }

    /// Returns `false` if the id was already selected.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) { return false; }
        self.ids.push(id);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|i| i != id);
        self.ids.len() != before
    }

    pub fn toggle(&mut self, id: &str) {
        if !self.remove(id) { self.add(id); }
    }

    /// Selects every id given (typically the ids of the current view).
    pub fn select_all<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids { self.add(id); }
    }

    pub fn clear(&mut self) { self.ids.clear(); }

    /// Drops ids that no longer exist.
    pub fn retain(&mut self, keep: impl Fn(&str) -> bool) { self.ids.retain(|id| keep(id)); }
}

/// Handle for an action waiting on the user's confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ConfirmationToken(Uuid);

impl ConfirmationToken {
    fn generate() -> Self { Self(Uuid::new_v4()) }
    pub fn as_uuid(&self) -> Uuid { self.0 }
}

impl fmt::Display for ConfirmationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// A destructive action that has been requested but not committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PendingAction {
    Delete { collection: Collection, ids: Vec<String> },
    DeclineRfq { id: String },
}

/// Requested-but-unconfirmed actions. Nothing here touches the store.
#[derive(Debug, Default)]
pub struct Confirmations {
    pending: HashMap<ConfirmationToken, PendingAction>,
}

impl Confirmations {
    pub fn new() -> Self { Self::default() }

    pub fn request(&mut self, action: PendingAction) -> ConfirmationToken {
        let token = ConfirmationToken::generate();
        self.pending.insert(token, action);
        token
    }

    pub fn peek(&self, token: ConfirmationToken) -> Option<&PendingAction> { self.pending.get(&token) }

    /// Removes and returns the action, for either confirm or cancel.
    pub fn take(&mut self, token: ConfirmationToken) -> Result<PendingAction> {
        self.pending.remove(&token).ok_or(ConsoleError::UnknownConfirmation(token.0))
    }

    /// Puts back an action taken by the wrong confirm call.
    pub(crate) fn restore(&mut self, token: ConfirmationToken, action: PendingAction) {
        self.pending.insert(token, action);
    }

    pub fn len(&self) -> usize { self.pending.len() }
    pub fn is_empty(&self) -> bool { self.pending.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_ops() {
        let mut s = Selection::new();
        assert!(s.add("a"));
        assert!(!s.add("a"));
        s.select_all(["b", "c", "a"]);
        assert_eq!(s.ids(), ["a", "b", "c"]);
        s.toggle("b");
        assert_eq!(s.ids(), ["a", "c"]);
        s.toggle("b");
        assert!(s.contains("b"));
        s.retain(|id| id != "a");
        assert_eq!(s.len(), 2);
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn test_confirmation_round_trip() {
        let mut c = Confirmations::new();
        let token = c.request(PendingAction::DeclineRfq { id: "R1".into() });
        assert!(c.peek(token).is_some());
        assert_eq!(c.take(token).unwrap(), PendingAction::DeclineRfq { id: "R1".into() });
        assert!(matches!(c.take(token), Err(ConsoleError::UnknownConfirmation(_))));
        assert!(c.is_empty());
    }
}
