//! Aggregates module
pub mod rfq;
pub mod order;
pub mod ticket;
pub mod product;

pub use rfq::{QuoteInput, RequestedProduct, Rfq, RfqDraft, RfqOperation, RfqPriority, RfqStatus};
pub use order::{Address, LineItemInput, Order, OrderDraft, OrderOperation, OrderState, OrderStatus, TrackingInput};
pub use ticket::{ReplyInput, Ticket, TicketCategory, TicketDraft, TicketOperation, TicketPriority, TicketStatus};
pub use product::{Product, ProductDraft, ProductImage, ProductStatus, SeoData, Specification, Variant};
