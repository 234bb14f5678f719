//! Domain events
use crate::domain::aggregates::{OrderStatus, RfqStatus, TicketStatus};
use crate::store::Collection;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DomainEvent {
    Rfq(RfqEvent),
    Order(OrderEvent),
    Ticket(TicketEvent),
    Product(ProductEvent),
    Removed { collection: Collection, id: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum RfqEvent {
    Created { rfq_id: String, rfq_number: String },
    Quoted { rfq_id: String, amount: Option<Decimal> },
    StatusChanged { rfq_id: String, from: RfqStatus, to: RfqStatus },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum OrderEvent {
    Created { order_id: String, total: Decimal },
    Paid { order_id: String },
    Fulfilled { order_id: String },
    Shipped { order_id: String, tracking: String, carrier: String },
    Delivered { order_id: String },
    StatusChanged { order_id: String, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum TicketEvent {
    Opened { ticket_id: String },
    Replied { ticket_id: String, response_count: usize },
    StatusChanged { ticket_id: String, from: TicketStatus, to: TicketStatus },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ProductEvent {
    Created { product_id: String },
    BulkEdited { product_id: String },
}

/// Aggregates that buffer events until the console commits them.
pub trait Evented {
    fn take_events(&mut self) -> Vec<DomainEvent>;
}

macro_rules! evented {
    ($($ty:ty),*) => {
        $(impl Evented for $ty {
            fn take_events(&mut self) -> Vec<DomainEvent> { <$ty>::take_events(self) }
        })*
    };
}

evented!(
    crate::domain::aggregates::Rfq,
    crate::domain::aggregates::Order,
    crate::domain::aggregates::Ticket,
    crate::domain::aggregates::Product
);
