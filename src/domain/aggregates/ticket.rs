//! Support Ticket Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::domain::events::{DomainEvent, TicketEvent};
use crate::domain::lifecycle::Lifecycle;
use crate::domain::value_objects::StatusChange;
use crate::{not_blank, ConsoleError, FieldErrors, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    id: String,
    subject: String,
    category: TicketCategory,
    priority: TicketPriority,
    status: TicketStatus,
    description: String,
    order_id: Option<String>,
    responses: Vec<Response>,
    history: Vec<StatusChange<TicketStatus>>,
    attachments: Vec<Attachment>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)] pub struct Attachment { pub name: String, pub url: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub sender: String,
    pub role: ResponseRole,
    pub at: DateTime<Utc>,
    pub message: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseRole { #[default] User, Support, Internal }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory { Order, Payment, Shipping, Product, Account, Technical, Other }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority { Low, #[default] Medium, High, Urgent }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus { #[default] Open, InProgress, Resolved, Closed }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketOperation { StartProgress, MarkResolved, Close, Reopen }

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order", Self::Payment => "payment", Self::Shipping => "shipping", Self::Product => "product",
            Self::Account => "account", Self::Technical => "technical", Self::Other => "other",
        }
    }
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Low => "low", Self::Medium => "medium", Self::High => "high", Self::Urgent => "urgent" }
    }
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Open => "open", Self::InProgress => "in_progress", Self::Resolved => "resolved", Self::Closed => "closed" }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for TicketOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StartProgress => "start_progress", Self::MarkResolved => "mark_resolved",
            Self::Close => "close", Self::Reopen => "reopen",
        })
    }
}

impl Lifecycle for TicketStatus {
    type Operation = TicketOperation;

    fn next(self, operation: TicketOperation) -> Option<Self> {
        use TicketOperation::*;
        use TicketStatus::*;
        match (self, operation) {
            (Open, StartProgress) => Some(InProgress),
            (Open | InProgress, MarkResolved) => Some(Resolved),
            (Resolved, Close) => Some(Closed),
            (Resolved | Closed, Reopen) => Some(Open),
            _ => None,
        }
    }
}

/// Creation input from the new-ticket form.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct TicketDraft {
    pub id: Option<String>,
    #[validate(custom = "not_blank")]
    pub subject: String,
    #[validate(required(message = "category is required"))]
    pub category: Option<TicketCategory>,
    #[serde(default)]
    pub priority: TicketPriority,
    #[validate(length(min = 50, message = "must be at least 50 characters"))]
    pub description: String,
    pub order_id: Option<String>,
    /// Contact email; the first response is attributed to it when given.
    #[validate(email(message = "must be a valid email address"))]
    pub requester: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A reply posted to an existing ticket.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ReplyInput {
    #[validate(custom = "not_blank")]
    pub sender: String,
    #[serde(default)]
    pub role: ResponseRole,
    #[validate(custom = "not_blank")]
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Ticket {
    /// Opens a ticket; the description becomes the first response.
    pub fn open(draft: TicketDraft, id: String, now: DateTime<Utc>) -> Result<Self> {
        draft.validate()?;
        let category = draft.category.ok_or_else(|| ConsoleError::field("category", "category is required"))?;
        let first = Response {
            sender: draft.requester.unwrap_or_else(|| "customer".to_string()), role: ResponseRole::User, at: now,
            message: draft.description.clone(), attachments: draft.attachments.clone(),
        };
        let mut ticket = Self {
            id: id.clone(), subject: draft.subject.trim().to_string(), category, priority: draft.priority,
            status: TicketStatus::Open, description: draft.description, order_id: draft.order_id,
            responses: vec![first], history: vec![StatusChange::new(TicketStatus::Open, now)],
            attachments: draft.attachments, created_at: now, updated_at: now, events: vec![],
        };
        ticket.raise_event(DomainEvent::Ticket(TicketEvent::Opened { ticket_id: id }));
        Ok(ticket)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn subject(&self) -> &str { &self.subject }
    pub fn category(&self) -> TicketCategory { self.category }
    pub fn priority(&self) -> TicketPriority { self.priority }
    pub fn status(&self) -> TicketStatus { self.status }
    pub fn description(&self) -> &str { &self.description }
    pub fn order_id(&self) -> Option<&str> { self.order_id.as_deref() }
    pub fn responses(&self) -> &[Response] { &self.responses }
    pub fn history(&self) -> &[StatusChange<TicketStatus>] { &self.history }
    pub fn attachments(&self) -> &[Attachment] { &self.attachments }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Record-level rules for tickets that did not come through [`Ticket::open`].
    pub fn violations(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.subject.trim().is_empty() { errors.push("subject", "must not be blank"); }
        if self.history.iter().zip(self.history.iter().skip(1)).any(|(a, b)| b.at < a.at) {
            errors.push("history", "entries must be in time order");
        }
        errors
    }

    pub fn start_progress(&mut self, now: DateTime<Utc>) -> Result<()> { self.apply(TicketOperation::StartProgress, now) }
    pub fn mark_resolved(&mut self, now: DateTime<Utc>) -> Result<()> { self.apply(TicketOperation::MarkResolved, now) }
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<()> { self.apply(TicketOperation::Close, now) }
    pub fn reopen(&mut self, now: DateTime<Utc>) -> Result<()> { self.apply(TicketOperation::Reopen, now) }

    /// Appends a response. Status is left alone; closed tickets take no replies.
    pub fn reply(&mut self, input: ReplyInput, now: DateTime<Utc>) -> Result<()> {
        if self.status == TicketStatus::Closed {
            return Err(ConsoleError::invalid_transition("reply", self.status));
        }
        input.validate()?;
        self.attachments.extend(input.attachments.iter().cloned());
        self.responses.push(Response { sender: input.sender, role: input.role, at: now, message: input.message, attachments: input.attachments });
        self.updated_at = now;
        self.raise_event(DomainEvent::Ticket(TicketEvent::Replied { ticket_id: self.id.clone(), response_count: self.responses.len() }));
        Ok(())
    }

    /// Triage fields touched by bulk edits.
    pub(crate) fn retriage(&mut self, priority: Option<TicketPriority>, category: Option<TicketCategory>, now: DateTime<Utc>) {
        if let Some(p) = priority { self.priority = p; }
        if let Some(c) = category { self.category = c; }
        self.updated_at = now;
    }

    fn apply(&mut self, operation: TicketOperation, now: DateTime<Utc>) -> Result<()> {
        let from = self.status;
        let to = from.advance(operation)?;
        self.status = to;
        self.history.push(StatusChange::new(to, now));
        self.updated_at = now;
        self.raise_event(DomainEvent::Ticket(TicketEvent::StatusChanged { ticket_id: self.id.clone(), from, to }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}
