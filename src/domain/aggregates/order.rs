//! Order Aggregate
//!
//! Payment, fulfillment and shipment move independently; the display status
//! is derived from the three axes on every read.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::lifecycle::Lifecycle;
use crate::domain::value_objects::{Customer, Money, MoneyError, StatusChange};
use crate::{non_negative, not_blank, FieldErrors, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    id: String,
    order_number: String,
    customer: Customer,
    items: Vec<LineItem>,
    discount: Money,
    shipping: Money,
    tax_rate: Decimal,
    payment: PaymentStatus,
    fulfillment: FulfillmentStatus,
    shipment: ShipmentStatus,
    tracking: Option<Tracking>,
    shipping_address: Address,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    history: Vec<StatusChange<OrderStatus>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

struct Totals { subtotal: Money, tax: Money, total: Money }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)] pub struct LineItem { pub name: String, pub variant: Option<String>, pub unit_price: Money, pub quantity: u32 }
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] pub struct Address { pub name: String, pub street1: String, pub street2: Option<String>, pub city: String, pub state: Option<String>, pub zip: String, pub country: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub number: String,
    pub carrier: String,
    pub status: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub shipped_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] #[serde(rename_all = "snake_case")] pub enum PaymentStatus { #[default] Unpaid, Paid }
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] #[serde(rename_all = "snake_case")] pub enum FulfillmentStatus { #[default] Unfulfilled, Fulfilled }
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] #[serde(rename_all = "snake_case")] pub enum ShipmentStatus { #[default] None, Shipped, Delivered }

/// Display label; always computed from [`OrderState`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Processing, Fulfilled, Shipped, Delivered }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOperation { MarkPaid, MarkFulfilled, AddTracking, MarkDelivered }

/// The three orthogonal axes of an order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderState {
    pub payment: PaymentStatus,
    pub fulfillment: FulfillmentStatus,
    pub shipment: ShipmentStatus,
}

impl OrderState {
    pub fn display_status(&self) -> OrderStatus {
        match (self.shipment, self.fulfillment, self.payment) {
            (ShipmentStatus::Delivered, _, _) => OrderStatus::Delivered,
            (ShipmentStatus::Shipped, _, _) => OrderStatus::Shipped,
            (_, FulfillmentStatus::Fulfilled, _) => OrderStatus::Fulfilled,
            (_, _, PaymentStatus::Paid) => OrderStatus::Processing,
            _ => OrderStatus::Pending,
        }
    }
}

impl Lifecycle for OrderState {
    type Operation = OrderOperation;

    fn next(self, operation: OrderOperation) -> Option<Self> {
        use FulfillmentStatus::*;
        use PaymentStatus::*;
        match (operation, self.payment, self.fulfillment, self.shipment) {
            (OrderOperation::MarkPaid, Unpaid, _, _) => Some(Self { payment: Paid, ..self }),
            (OrderOperation::MarkFulfilled, Paid, Unfulfilled, _) => Some(Self { fulfillment: Fulfilled, ..self }),
            (OrderOperation::AddTracking, Paid, Fulfilled, ShipmentStatus::None) => Some(Self { shipment: ShipmentStatus::Shipped, ..self }),
            (OrderOperation::MarkDelivered, Paid, Fulfilled, ShipmentStatus::Shipped) => Some(Self { shipment: ShipmentStatus::Delivered, ..self }),
            _ => None,
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payment = match self.payment { PaymentStatus::Unpaid => "unpaid", PaymentStatus::Paid => "paid" };
        let fulfillment = match self.fulfillment { FulfillmentStatus::Unfulfilled => "unfulfilled", FulfillmentStatus::Fulfilled => "fulfilled" };
        let shipment = match self.shipment { ShipmentStatus::None => "not shipped", ShipmentStatus::Shipped => "shipped", ShipmentStatus::Delivered => "delivered" };
        write!(f, "{}, {}, {}", payment, fulfillment, shipment)
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Processing => "processing", Self::Fulfilled => "fulfilled",
            Self::Shipped => "shipped", Self::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for OrderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MarkPaid => "mark_paid", Self::MarkFulfilled => "mark_fulfilled",
            Self::AddTracking => "add_tracking", Self::MarkDelivered => "mark_delivered",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)] pub struct LineItemInput { pub name: String, pub variant: Option<String>, pub unit_price: Decimal, pub quantity: u32 }

/// Creation input for an order.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct OrderDraft {
    pub id: Option<String>,
    pub order_number: Option<String>,
    pub customer: Customer,
    #[validate(length(min = 1, message = "at least one line item is required"))]
    pub line_items: Vec<LineItemInput>,
    #[validate(custom = "non_negative")]
    #[serde(default)]
    pub discount: Decimal,
    #[validate(custom = "non_negative")]
    #[serde(default)]
    pub shipping: Decimal,
    #[serde(default)]
    pub shipping_address: Address,
}

impl OrderDraft {
    pub fn check(&self) -> Result<()> {
        let mut errors = self.validate().err().map(FieldErrors::from).unwrap_or_default();
        if self.line_items.iter().any(|i| i.quantity == 0) {
            errors.push("line_items", "quantity must be at least 1");
        }
        if self.line_items.iter().any(|i| non_negative(&i.unit_price).is_err()) {
            errors.push("line_items", "unit price must not be negative");
        }
        let subtotal = self.line_items.iter().try_fold(Decimal::ZERO, |acc, i| {
            i.unit_price.checked_mul(Decimal::from(i.quantity)).and_then(|line| acc.checked_add(line))
        });
        if subtotal.is_none() {
            errors.push("line_items", "order total is out of range");
        }
        errors.into_result()
    }
}

/// Payload of the `add_tracking` action.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct TrackingInput {
    #[validate(custom = "not_blank")]
    pub number: String,
    #[validate(custom = "not_blank")]
    pub carrier: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[validate(url(message = "must be a valid URL"))]
    pub url: Option<String>,
}

impl TrackingInput {
    pub fn new(number: impl Into<String>, carrier: impl Into<String>) -> Self {
        Self { number: number.into(), carrier: carrier.into(), ..Default::default() }
    }
}

impl Order {
    pub fn create(draft: OrderDraft, id: String, order_number: String, currency: &str, tax_rate: Decimal, now: DateTime<Utc>) -> Result<Self> {
        draft.check()?;
        let items = draft.line_items.into_iter()
            .map(|i| LineItem { name: i.name, variant: i.variant, unit_price: Money::new(i.unit_price, currency), quantity: i.quantity })
            .collect();
        let mut order = Self {
            id, order_number, customer: draft.customer, items,
            discount: Money::new(draft.discount, currency), shipping: Money::new(draft.shipping, currency), tax_rate,
            payment: PaymentStatus::Unpaid, fulfillment: FulfillmentStatus::Unfulfilled, shipment: ShipmentStatus::None,
            tracking: None, shipping_address: draft.shipping_address, created_at: now, updated_at: now,
            history: vec![StatusChange::new(OrderStatus::Pending, now)], events: vec![],
        };
        order.violations().into_result()?;
        let total = order.total().amount();
        order.raise_event(DomainEvent::Order(OrderEvent::Created { order_id: order.id.clone(), total }));
        Ok(order)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn customer(&self) -> &Customer { &self.customer }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn tracking(&self) -> Option<&Tracking> { self.tracking.as_ref() }
    pub fn shipping_address(&self) -> &Address { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn history(&self) -> &[StatusChange<OrderStatus>] { &self.history }
    pub fn payment_status(&self) -> PaymentStatus { self.payment }
    pub fn fulfillment_status(&self) -> FulfillmentStatus { self.fulfillment }
    pub fn shipment_status(&self) -> ShipmentStatus { self.shipment }

    pub fn state(&self) -> OrderState {
        OrderState { payment: self.payment, fulfillment: self.fulfillment, shipment: self.shipment }
    }

    pub fn status(&self) -> OrderStatus { self.state().display_status() }

    pub fn subtotal(&self) -> Money { self.totals().map(|t| t.subtotal).unwrap_or_else(|_| self.zero()) }
    pub fn discount(&self) -> &Money { &self.discount }
    pub fn shipping(&self) -> &Money { &self.shipping }
    /// Tax on the discounted subtotal, rounded half away from zero to cents.
    pub fn tax(&self) -> Money { self.totals().map(|t| t.tax).unwrap_or_else(|_| self.zero()) }
    pub fn total(&self) -> Money { self.totals().map(|t| t.total).unwrap_or_else(|_| self.zero()) }

    fn zero(&self) -> Money { Money::zero(self.shipping.currency()) }

    /// Checked arithmetic. Orders are only admitted by `create` and snapshot
    /// loading, and both reject orders whose totals fail here.
    fn totals(&self) -> std::result::Result<Totals, MoneyError> {
        let mut subtotal = self.zero();
        for item in &self.items {
            subtotal = subtotal.add(&item.unit_price.multiply(item.quantity)?)?;
        }
        let discounted = subtotal.subtract(&self.discount)?;
        let tax = discounted.amount().max(Decimal::ZERO)
            .checked_mul(self.tax_rate)
            .ok_or(MoneyError::Overflow)?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let tax = self.shipping.with_amount(tax);
        let total = discounted.add(&self.shipping)?.add(&tax)?;
        Ok(Totals { subtotal, tax, total })
    }

    /// Record-level rules for orders that did not come through [`Order::create`].
    pub fn violations(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.items.is_empty() { errors.push("items", "at least one line item is required"); }
        if self.items.iter().any(|i| i.quantity == 0) { errors.push("items", "quantity must be at least 1"); }
        if self.items.iter().any(|i| i.unit_price.is_negative()) { errors.push("items", "unit price must not be negative"); }
        if self.discount.is_negative() { errors.push("discount", "must not be negative"); }
        if self.shipping.is_negative() { errors.push("shipping", "must not be negative"); }
        if self.tax_rate < Decimal::ZERO { errors.push("tax_rate", "must not be negative"); }
        match self.totals() {
            Err(MoneyError::CurrencyMismatch) => errors.push("currency", "all amounts must share one currency"),
            Err(MoneyError::Overflow) => errors.push("total", "order total is out of range"),
            Ok(_) => {}
        }
        if self.fulfillment == FulfillmentStatus::Fulfilled && self.payment != PaymentStatus::Paid {
            errors.push("fulfillment", "fulfilled orders must be paid");
        }
        if self.shipment != ShipmentStatus::None
            && (self.payment != PaymentStatus::Paid || self.fulfillment != FulfillmentStatus::Fulfilled)
        {
            errors.push("shipment", "shipped orders must be paid and fulfilled");
        }
        if let Some(tracking) = &self.tracking {
            if tracking.delivered_at.is_some_and(|at| at < tracking.shipped_at) {
                errors.push("tracking", "delivered before shipped");
            }
        }
        errors
    }

    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(OrderOperation::MarkPaid, now)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id.clone() }));
        Ok(())
    }

    pub fn mark_fulfilled(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(OrderOperation::MarkFulfilled, now)?;
        self.raise_event(DomainEvent::Order(OrderEvent::Fulfilled { order_id: self.id.clone() }));
        Ok(())
    }

    /// Ships the order. The state check runs before input validation so an
    /// out-of-order call reports the transition, not the form.
    pub fn add_tracking(&mut self, input: TrackingInput, now: DateTime<Utc>) -> Result<()> {
        self.state().advance(OrderOperation::AddTracking)?;
        input.validate()?;
        let tracking = Tracking {
            number: input.number.trim().to_string(), carrier: input.carrier.trim().to_string(),
            status: "in_transit".to_string(), estimated_delivery: input.estimated_delivery,
            shipped_at: now, delivered_at: None, url: input.url,
        };
        self.raise_event(DomainEvent::Order(OrderEvent::Shipped {
            order_id: self.id.clone(), tracking: tracking.number.clone(), carrier: tracking.carrier.clone(),
        }));
        self.tracking = Some(tracking);
        self.apply(OrderOperation::AddTracking, now)
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(OrderOperation::MarkDelivered, now)?;
        if let Some(tracking) = self.tracking.as_mut() {
            tracking.status = "delivered".to_string();
            tracking.delivered_at = Some(now.max(tracking.shipped_at));
        }
        self.raise_event(DomainEvent::Order(OrderEvent::Delivered { order_id: self.id.clone() }));
        Ok(())
    }

    fn apply(&mut self, operation: OrderOperation, now: DateTime<Utc>) -> Result<()> {
        let from = self.status();
        let next = self.state().advance(operation)?;
        self.payment = next.payment;
        self.fulfillment = next.fulfillment;
        self.shipment = next.shipment;
        let to = self.status();
        self.history.push(StatusChange::new(to, now));
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id.clone(), from, to }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}
