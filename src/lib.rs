//! OpenSASE Business Operations Console
//!
//! Lifecycle and bulk-mutation core behind the operations console.
//!
//! ## Features
//! - RFQ, order and support-ticket status machines with audit trails
//! - Deterministic filter/sort views over every collection
//! - Sparse bulk edits (price/inventory adjustments, tag reconciliation)
//! - Two-phase confirmation for destructive actions

pub mod bulk;
pub mod config;
pub mod console;
pub mod domain;
pub mod pipeline;
pub mod selection;
pub mod store;

pub use bulk::{Adjustment, AdjustmentKind, BulkEditable, ProductIntent, TicketIntent};
pub use config::ConsoleConfig;
pub use console::{BulkAction, BulkOutcome, Clock, Console, Draft, FixedClock, SystemClock, Transition};
pub use pipeline::{SortDirection, SortKey, ViewQuery};
pub use selection::{ConfirmationToken, Selection};
pub use store::{Collection, EntityStore, Record};

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Cannot {operation} while {state}")]
    InvalidTransition { operation: String, state: String },

    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("Batch rejected at record {record_id}: {source}")]
    BatchRejected {
        record_id: String,
        #[source]
        source: Box<ConsoleError>,
    },

    #[error("Confirmation {0} is not pending")]
    UnknownConfirmation(Uuid),

    #[error("No records selected")]
    SelectionEmpty,
}

impl ConsoleError {
    pub fn invalid_transition(operation: impl fmt::Display, state: impl fmt::Display) -> Self {
        Self::InvalidTransition { operation: operation.to_string(), state: state.to_string() }
    }

    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound { collection, id: id.into() }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Field-keyed validation messages, ordered by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self { Self::default() }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Re-keys every field as `prefix.field`.
    pub fn nested(self, prefix: &str) -> FieldErrors {
        FieldErrors(self.0.into_iter().map(|(field, messages)| (format!("{}.{}", prefix, field), messages)).collect())
    }

    pub fn contains(&self, field: &str) -> bool { self.0.contains_key(field) }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() { Ok(()) } else { Err(ConsoleError::Validation(self)) }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, list) in errors.field_errors() {
            for error in list.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                out.push(field, message);
            }
        }
        out
    }
}

impl From<validator::ValidationErrors> for ConsoleError {
    fn from(errors: validator::ValidationErrors) -> Self { Self::Validation(errors.into()) }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first { write!(f, "; ")?; }
            first = false;
            write!(f, "{}: {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

/// Shared `validator` hook for required free-text fields.
pub(crate) fn not_blank(value: &str) -> std::result::Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut error = validator::ValidationError::new("blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

/// Shared `validator` hook for amounts that must not go below zero.
pub(crate) fn non_negative(value: &rust_decimal::Decimal) -> std::result::Result<(), validator::ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = validator::ValidationError::new("negative");
        error.message = Some("must not be negative".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_display() {
        let mut errors = FieldErrors::single("subject", "must not be blank");
        errors.push("description", "too short");
        assert_eq!(errors.to_string(), "description: too short; subject: must not be blank");
        assert!(errors.contains("subject"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_field_errors_nested_merge() {
        let mut all = FieldErrors::single("orders/O1", "duplicate id");
        all.merge(FieldErrors::single("items", "quantity must be at least 1").nested("orders/O1"));
        all.merge(FieldErrors::single("orders/O1", "again"));
        assert!(all.contains("orders/O1.items"));
        assert_eq!(all.to_string(), "orders/O1: duplicate id, again; orders/O1.items: quantity must be at least 1");
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("  ").is_err());
        assert!(not_blank("FedEx").is_ok());
    }
}
