//! RFQ Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::domain::events::{DomainEvent, RfqEvent};
use crate::domain::lifecycle::Lifecycle;
use crate::domain::value_objects::{Customer, Money, StatusChange};
use crate::{non_negative, not_blank, ConsoleError, FieldErrors, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rfq {
    id: String,
    rfq_number: String,
    customer: Customer,
    products: Vec<RequestedProduct>,
    estimated_value: Money,
    priority: RfqPriority,
    status: RfqStatus,
    deadline: DateTime<Utc>,
    created_at: DateTime<Utc>,
    notes: String,
    quote: Option<Quote>,
    history: Vec<StatusChange<RfqStatus>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)] pub struct RequestedProduct { pub name: String, pub quantity: u32, pub specification: String }
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)] pub struct Quote { pub amount: Option<Money>, pub message: Option<String>, pub sent_at: DateTime<Utc> }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqPriority { Low, #[default] Medium, High }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus { #[default] Pending, Quoted, Accepted, Expired }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqOperation { Accept, Decline, SendQuote }

impl RfqPriority {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Low => "low", Self::Medium => "medium", Self::High => "high" }
    }
}

impl RfqStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Quoted => "quoted", Self::Accepted => "accepted", Self::Expired => "expired" }
    }
}

impl fmt::Display for RfqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for RfqOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Accept => "accept", Self::Decline => "decline", Self::SendQuote => "send_quote" })
    }
}

impl Lifecycle for RfqStatus {
    type Operation = RfqOperation;

    fn next(self, operation: RfqOperation) -> Option<Self> {
        use RfqOperation::*;
        use RfqStatus::*;
        match (self, operation) {
            (Pending, Accept) => Some(Accepted),
            (Pending, Decline) => Some(Expired),
            (Pending, SendQuote) => Some(Quoted),
            _ => None,
        }
    }
}

/// Creation input for an RFQ, as submitted by the intake form.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct RfqDraft {
    pub id: Option<String>,
    pub rfq_number: Option<String>,
    #[validate(custom = "not_blank")]
    pub company: String,
    #[validate(custom = "not_blank")]
    pub contact_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "at least one product is required"))]
    pub products: Vec<RequestedProduct>,
    #[validate(custom = "non_negative")]
    pub estimated_value: Decimal,
    #[serde(default)]
    pub priority: RfqPriority,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

impl RfqDraft {
    pub fn check(&self) -> Result<()> {
        let mut errors = self.validate().err().map(FieldErrors::from).unwrap_or_default();
        if self.products.iter().any(|p| p.quantity == 0) {
            errors.push("products", "quantity must be at least 1");
        }
        errors.into_result()
    }
}

/// Payload of the `send_quote` action.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuoteInput { pub amount: Option<Decimal>, pub message: Option<String> }

impl Rfq {
    pub fn create(draft: RfqDraft, id: String, rfq_number: String, currency: &str, now: DateTime<Utc>) -> Result<Self> {
        draft.check()?;
        let mut rfq = Self {
            id: id.clone(), rfq_number: rfq_number.clone(),
            customer: Customer { company: draft.company, contact_name: draft.contact_name, email: draft.email, phone: draft.phone },
            products: draft.products, estimated_value: Money::new(draft.estimated_value, currency),
            priority: draft.priority, status: RfqStatus::Pending, deadline: draft.deadline, created_at: now,
            notes: draft.notes, quote: None, history: vec![StatusChange::new(RfqStatus::Pending, now)], events: vec![],
        };
        rfq.raise_event(DomainEvent::Rfq(RfqEvent::Created { rfq_id: id, rfq_number }));
        Ok(rfq)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn rfq_number(&self) -> &str { &self.rfq_number }
    pub fn customer(&self) -> &Customer { &self.customer }
    pub fn products(&self) -> &[RequestedProduct] { &self.products }
    pub fn estimated_value(&self) -> &Money { &self.estimated_value }
    pub fn priority(&self) -> RfqPriority { self.priority }
    pub fn status(&self) -> RfqStatus { self.status }
    pub fn deadline(&self) -> DateTime<Utc> { self.deadline }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn notes(&self) -> &str { &self.notes }
    pub fn quote(&self) -> Option<&Quote> { self.quote.as_ref() }
    pub fn history(&self) -> &[StatusChange<RfqStatus>] { &self.history }

    /// Record-level rules for RFQs that did not come through [`Rfq::create`].
    pub fn violations(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.products.is_empty() { errors.push("products", "at least one product is required"); }
        if self.products.iter().any(|p| p.quantity == 0) { errors.push("products", "quantity must be at least 1"); }
        if self.estimated_value.is_negative() { errors.push("estimated_value", "must not be negative"); }
        if let Some(amount) = self.quote.as_ref().and_then(|q| q.amount.as_ref()) {
            if amount.is_negative() { errors.push("quote", "must not be negative"); }
        }
        errors
    }

    /// Fails without side effects when `operation` is not legal right now.
    pub fn ensure_allowed(&self, operation: RfqOperation) -> Result<()> {
        self.status.advance(operation).map(|_| ())
    }

    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<()> { self.apply(RfqOperation::Accept, now) }

    /// Commits a confirmed decline; the request phase lives in the console.
    pub fn decline(&mut self, now: DateTime<Utc>) -> Result<()> { self.apply(RfqOperation::Decline, now) }

    pub fn send_quote(&mut self, input: QuoteInput, now: DateTime<Utc>) -> Result<()> {
        self.ensure_allowed(RfqOperation::SendQuote)?;
        if let Some(amount) = input.amount {
            if non_negative(&amount).is_err() {
                return Err(ConsoleError::field("amount", "must not be negative"));
            }
        }
        let amount = input.amount.map(|a| self.estimated_value.with_amount(a));
        self.quote = Some(Quote { amount: amount.clone(), message: input.message, sent_at: now });
        self.raise_event(DomainEvent::Rfq(RfqEvent::Quoted { rfq_id: self.id.clone(), amount: amount.map(|m| m.amount()) }));
        self.apply(RfqOperation::SendQuote, now)
    }

    fn apply(&mut self, operation: RfqOperation, now: DateTime<Utc>) -> Result<()> {
        let from = self.status;
        let to = from.advance(operation)?;
        self.status = to;
        self.history.push(StatusChange::new(to, now));
        self.raise_event(DomainEvent::Rfq(RfqEvent::StatusChanged { rfq_id: self.id.clone(), from, to }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn draft() -> RfqDraft {
        RfqDraft {
            company: "Acme Toys".into(), contact_name: "Dana Reyes".into(), email: "dana@acme.test".into(),
            products: vec![RequestedProduct { name: "Plush bear".into(), quantity: 500, specification: "30cm, brown".into() }],
            estimated_value: dec!(12500), deadline: Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap(),
            ..Default::default()
        }
    }

    fn rfq() -> Rfq {
        Rfq::create(draft(), "R1".into(), "RFQ-2026-0001".into(), "USD", Utc::now()).unwrap()
    }

    #[test]
    fn test_accept_from_pending() {
        let mut r = rfq();
        let before = r.history().len();
        r.accept(Utc::now()).unwrap();
        assert_eq!(r.status(), RfqStatus::Accepted);
        assert_eq!(r.history().len(), before + 1);
        assert_eq!(r.history().last().unwrap().status, RfqStatus::Accepted);
    }

    #[test]
    fn test_accept_from_quoted_rejected() {
        let mut r = rfq();
        r.send_quote(QuoteInput { amount: Some(dec!(11900)), message: None }, Utc::now()).unwrap();
        let history = r.history().len();
        let err = r.accept(Utc::now()).unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidTransition { ref operation, ref state } if operation == "accept" && state == "quoted"));
        assert_eq!(r.status(), RfqStatus::Quoted);
        assert_eq!(r.history().len(), history);
    }

    #[test]
    fn test_decline_expires() {
        let mut r = rfq();
        r.decline(Utc::now()).unwrap();
        assert_eq!(r.status(), RfqStatus::Expired);
        assert!(r.ensure_allowed(RfqOperation::SendQuote).is_err());
    }

    #[test]
    fn test_negative_quote_rejected() {
        let mut r = rfq();
        let err = r.send_quote(QuoteInput { amount: Some(dec!(-1)), message: None }, Utc::now()).unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(ref f) if f.contains("amount")));
        assert_eq!(r.status(), RfqStatus::Pending);
        assert!(r.quote().is_none());
    }

    #[test]
    fn test_loaded_rfq_violations() {
        let mut r = rfq();
        assert!(r.violations().is_empty());
        r.estimated_value = Money::new(dec!(-1), "USD");
        r.products[0].quantity = 0;
        let errors = r.violations();
        assert!(errors.contains("estimated_value"));
        assert!(errors.contains("products"));
    }

    #[test]
    fn test_draft_validation() {
        let mut d = draft();
        d.company = "  ".into();
        d.estimated_value = dec!(-5);
        d.products[0].quantity = 0;
        let err = d.check().unwrap_err();
        let ConsoleError::Validation(fields) = err else { panic!("expected validation error") };
        assert!(fields.contains("company"));
        assert!(fields.contains("estimated_value"));
        assert!(fields.contains("products"));
    }
}
