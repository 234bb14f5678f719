//! Console façade: the in-process contract the UI talks to.
//!
//! Every mutation clones the current record, changes the clone, and writes
//! it back only when the whole operation succeeded. A failed call leaves the
//! store exactly as it was.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bulk::BulkEditable;
use crate::config::ConsoleConfig;
use crate::domain::aggregates::{
    Order, OrderDraft, Product, ProductDraft, QuoteInput, ReplyInput, Rfq, RfqDraft, RfqOperation, Ticket, TicketDraft,
    TrackingInput,
};
use crate::domain::events::{DomainEvent, Evented};
use crate::pipeline::{view, ViewQuery, Viewable};
use crate::selection::{ConfirmationToken, Confirmations, PendingAction, Selection};
use crate::store::{next_sequence, Collection, Entity, EntityStore, Record, StoreSnapshot};
use crate::{ConsoleError, Result};

/// Source of "now" for every mutation.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// Manually driven clock with millisecond resolution. Clones share one time.
#[derive(Clone, Debug)]
pub struct FixedClock(Arc<AtomicI64>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self { Self(Arc::new(AtomicI64::new(at.timestamp_millis()))) }
    pub fn set(&self, at: DateTime<Utc>) { self.0.store(at.timestamp_millis(), Ordering::SeqCst); }
    pub fn advance(&self, by: chrono::Duration) { self.0.fetch_add(by.num_milliseconds(), Ordering::SeqCst); }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0.load(Ordering::SeqCst)).single().unwrap_or_default()
    }
}

/// A status-changing action plus its payload.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "snake_case")]
pub enum Transition {
    Accept,
    SendQuote(QuoteInput),
    MarkPaid,
    MarkFulfilled,
    AddTracking(TrackingInput),
    MarkDelivered,
    StartProgress,
    MarkResolved,
    Close,
    Reopen,
    Reply(ReplyInput),
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::SendQuote(_) => "send_quote",
            Self::MarkPaid => "mark_paid",
            Self::MarkFulfilled => "mark_fulfilled",
            Self::AddTracking(_) => "add_tracking",
            Self::MarkDelivered => "mark_delivered",
            Self::StartProgress => "start_progress",
            Self::MarkResolved => "mark_resolved",
            Self::Close => "close",
            Self::Reopen => "reopen",
            Self::Reply(_) => "reply",
        }
    }
}

/// Creation input for any collection.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "collection", content = "draft", rename_all = "snake_case")]
pub enum Draft {
    Rfqs(RfqDraft),
    Orders(OrderDraft),
    Tickets(TicketDraft),
    Products(ProductDraft),
}

#[derive(Clone, Debug)]
pub enum BulkAction<I> {
    /// Needs [`Console::confirm_delete`] before anything is removed.
    Delete,
    Edit(I),
}

#[derive(Clone, Debug)]
pub enum BulkOutcome<T> {
    AwaitingConfirmation(ConfirmationToken),
    Applied(Vec<T>),
}

pub struct Console {
    config: ConsoleConfig,
    clock: Box<dyn Clock>,
    store: EntityStore,
    selections: HashMap<Collection, Selection>,
    confirmations: Confirmations,
    events: Vec<DomainEvent>,
}

impl Console {
    pub fn new(config: ConsoleConfig) -> Self { Self::with_clock(config, SystemClock) }

    pub fn with_clock(config: ConsoleConfig, clock: impl Clock + 'static) -> Self {
        Self {
            config, clock: Box::new(clock), store: EntityStore::new(), selections: HashMap::new(),
            confirmations: Confirmations::new(), events: Vec::new(),
        }
    }

    /// Replaces the store contents with already-resolved collaborator data.
    /// An invalid snapshot leaves the current contents in place.
    pub fn load(&mut self, snapshot: StoreSnapshot) -> Result<()> {
        self.store = EntityStore::from_snapshot(snapshot)?;
        self.selections.clear();
        info!(
            rfqs = self.store.len(Collection::Rfqs), orders = self.store.len(Collection::Orders),
            tickets = self.store.len(Collection::Tickets), products = self.store.len(Collection::Products),
            "console loaded"
        );
        Ok(())
    }

    pub fn config(&self) -> &ConsoleConfig { &self.config }
    pub fn store(&self) -> &EntityStore { &self.store }
    pub fn now(&self) -> DateTime<Utc> { self.clock.now() }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get<T: Entity>(&self, id: &str) -> Result<T> { self.store.get::<T>(id).cloned() }

    pub fn get_record(&self, collection: Collection, id: &str) -> Result<Record> { self.store.get_record(collection, id) }

    pub fn view<T: Viewable>(&self, query: &ViewQuery) -> Vec<T> {
        view(self.store.all::<T>(), query).into_iter().cloned().collect()
    }

    pub fn view_records(&self, collection: Collection, query: &ViewQuery) -> Vec<Record> {
        fn records<T: Viewable>(store: &EntityStore, query: &ViewQuery) -> Vec<Record> {
            view(store.all::<T>(), query).into_iter().map(|r| r.clone().into()).collect()
        }
        match collection {
            Collection::Rfqs => records::<Rfq>(&self.store, query),
            Collection::Orders => records::<Order>(&self.store, query),
            Collection::Tickets => records::<Ticket>(&self.store, query),
            Collection::Products => records::<Product>(&self.store, query),
        }
    }

    pub fn set_selected(&mut self, selected: Option<(Collection, &str)>) -> Result<()> { self.store.set_selected(selected) }
    pub fn selected_record(&self) -> Option<Record> { self.store.selected_record() }

    // =========================================================================
    // Creation
    // =========================================================================

    pub fn create(&mut self, draft: Draft) -> Result<Record> {
        match draft {
            Draft::Rfqs(d) => self.create_rfq(d).map(Record::from),
            Draft::Orders(d) => self.create_order(d).map(Record::from),
            Draft::Tickets(d) => self.open_ticket(d).map(Record::from),
            Draft::Products(d) => self.create_product(d).map(Record::from),
        }
    }

    fn assign_id<T: Entity>(&self, requested: Option<String>) -> Result<String> {
        match requested.filter(|id| !id.trim().is_empty()) {
            Some(id) if self.store.contains::<T>(&id) => Err(ConsoleError::field("id", "already exists")),
            Some(id) => Ok(id),
            None => Ok(Uuid::now_v7().to_string()),
        }
    }

    #[instrument(skip(self, draft))]
    pub fn create_rfq(&mut self, mut draft: RfqDraft) -> Result<Rfq> {
        let now = self.clock.now();
        let id = self.assign_id::<Rfq>(draft.id.take())?;
        let number = draft.rfq_number.take().filter(|n| !n.trim().is_empty()).unwrap_or_else(|| {
            next_sequence(&self.config.rfq_prefix, now.year(), self.store.all::<Rfq>().iter().map(|r| r.rfq_number()))
        });
        let rfq = Rfq::create(draft, id, number, &self.config.currency, now)?;
        Ok(self.insert(rfq))
    }

    #[instrument(skip(self, draft))]
    pub fn create_order(&mut self, mut draft: OrderDraft) -> Result<Order> {
        let now = self.clock.now();
        let id = self.assign_id::<Order>(draft.id.take())?;
        let number = draft.order_number.take().filter(|n| !n.trim().is_empty()).unwrap_or_else(|| {
            next_sequence(&self.config.order_prefix, now.year(), self.store.all::<Order>().iter().map(|o| o.order_number()))
        });
        let order = Order::create(draft, id, number, &self.config.currency, self.config.tax_rate, now)?;
        Ok(self.insert(order))
    }

    /// Ticket ids are a per-year sequence unless the caller assigns one.
    #[instrument(skip(self, draft))]
    pub fn open_ticket(&mut self, mut draft: TicketDraft) -> Result<Ticket> {
        let now = self.clock.now();
        let id = match draft.id.take().filter(|id| !id.trim().is_empty()) {
            Some(id) => self.assign_id::<Ticket>(Some(id))?,
            None => next_sequence(&self.config.ticket_prefix, now.year(), self.store.all::<Ticket>().iter().map(|t| t.id())),
        };
        let ticket = Ticket::open(draft, id, now)?;
        Ok(self.insert(ticket))
    }

    #[instrument(skip(self, draft))]
    pub fn create_product(&mut self, mut draft: ProductDraft) -> Result<Product> {
        let now = self.clock.now();
        let id = self.assign_id::<Product>(draft.id.take())?;
        let product = Product::create(draft, id, &self.config.currency, now)?;
        Ok(self.insert(product))
    }

    fn insert<T: Entity + Evented>(&mut self, mut record: T) -> T {
        self.record_events(record.take_events());
        self.store.upsert(record.clone());
        info!(collection = %T::COLLECTION, id = %record.id(), "record created");
        record
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    #[instrument(skip(self, transition), fields(operation = transition.name()))]
    pub fn transition(&mut self, collection: Collection, id: &str, transition: Transition) -> Result<Record> {
        let now = self.clock.now();
        let operation = transition.name();
        let unsupported = move || ConsoleError::invalid_transition(operation, format!("a record in {}", collection));
        let result = match collection {
            Collection::Rfqs => self.commit::<Rfq>(id, |r| match transition {
                Transition::Accept => r.accept(now),
                Transition::SendQuote(quote) => r.send_quote(quote, now),
                _ => Err(unsupported()),
            }).map(Record::from),
            Collection::Orders => self.commit::<Order>(id, |o| match transition {
                Transition::MarkPaid => o.mark_paid(now),
                Transition::MarkFulfilled => o.mark_fulfilled(now),
                Transition::AddTracking(tracking) => o.add_tracking(tracking, now),
                Transition::MarkDelivered => o.mark_delivered(now),
                _ => Err(unsupported()),
            }).map(Record::from),
            Collection::Tickets => self.commit::<Ticket>(id, |t| match transition {
                Transition::StartProgress => t.start_progress(now),
                Transition::MarkResolved => t.mark_resolved(now),
                Transition::Close => t.close(now),
                Transition::Reopen => t.reopen(now),
                Transition::Reply(reply) => t.reply(reply, now),
                _ => Err(unsupported()),
            }).map(Record::from),
            Collection::Products => Err(unsupported()),
        };
        match &result {
            Ok(_) => info!(%collection, id, operation, "transition committed"),
            Err(e) => warn!(%collection, id, operation, error = %e, "transition rejected"),
        }
        result
    }

    /// Runs `change` on a copy and writes it back only on success.
    fn commit<T: Entity + Evented>(&mut self, id: &str, change: impl FnOnce(&mut T) -> Result<()>) -> Result<T> {
        let mut record = self.store.get::<T>(id)?.clone();
        change(&mut record)?;
        self.record_events(record.take_events());
        self.store.upsert(record.clone());
        Ok(record)
    }

    /// First phase of a decline. The RFQ is not touched until confirmation.
    #[instrument(skip(self))]
    pub fn request_decline(&mut self, id: &str) -> Result<ConfirmationToken> {
        self.store.get::<Rfq>(id)?.ensure_allowed(RfqOperation::Decline)?;
        let token = self.confirmations.request(PendingAction::DeclineRfq { id: id.to_string() });
        debug!(%token, "decline awaiting confirmation");
        Ok(token)
    }

    #[instrument(skip(self))]
    pub fn confirm_decline(&mut self, token: ConfirmationToken) -> Result<Rfq> {
        let id = match self.confirmations.take(token)? {
            PendingAction::DeclineRfq { id } => id,
            other => {
                self.confirmations.restore(token, other);
                return Err(ConsoleError::UnknownConfirmation(token.as_uuid()));
            }
        };
        let now = self.clock.now();
        let result = self.commit::<Rfq>(&id, |r| r.decline(now));
        match &result {
            Ok(_) => info!(id = %id, "rfq declined"),
            Err(e) => warn!(id = %id, error = %e, "decline rejected at confirmation"),
        }
        result
    }

    /// Abandons a pending decline or delete. Nothing was written, so nothing is undone.
    pub fn cancel(&mut self, token: ConfirmationToken) -> Result<()> {
        let action = self.confirmations.take(token)?;
        debug!(%token, ?action, "confirmation cancelled");
        Ok(())
    }

    pub fn pending(&self, token: ConfirmationToken) -> Option<&PendingAction> { self.confirmations.peek(token) }

    // =========================================================================
    // Selection and bulk actions
    // =========================================================================

    pub fn selection(&self, collection: Collection) -> Option<&Selection> { self.selections.get(&collection) }

    pub fn selection_mut(&mut self, collection: Collection) -> &mut Selection { self.selections.entry(collection).or_default() }

    /// First phase of a bulk delete.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn request_delete(&mut self, collection: Collection, ids: &[String]) -> Result<ConfirmationToken> {
        if ids.is_empty() { return Err(ConsoleError::SelectionEmpty); }
        for id in ids {
            self.store.get_record(collection, id)?;
        }
        let token = self.confirmations.request(PendingAction::Delete { collection, ids: ids.to_vec() });
        debug!(%token, "delete awaiting confirmation");
        Ok(token)
    }

    /// Removes every record named by the token, or none if any has vanished.
    #[instrument(skip(self))]
    pub fn confirm_delete(&mut self, token: ConfirmationToken) -> Result<Vec<Record>> {
        let (collection, ids) = match self.confirmations.take(token)? {
            PendingAction::Delete { collection, ids } => (collection, ids),
            other => {
                self.confirmations.restore(token, other);
                return Err(ConsoleError::UnknownConfirmation(token.as_uuid()));
            }
        };
        let removed: Vec<Record> = match collection {
            Collection::Rfqs => self.store.remove_many::<Rfq>(&ids)?.into_iter().map(Record::from).collect(),
            Collection::Orders => self.store.remove_many::<Order>(&ids)?.into_iter().map(Record::from).collect(),
            Collection::Tickets => self.store.remove_many::<Ticket>(&ids)?.into_iter().map(Record::from).collect(),
            Collection::Products => self.store.remove_many::<Product>(&ids)?.into_iter().map(Record::from).collect(),
        };
        if let Some(selection) = self.selections.get_mut(&collection) {
            selection.retain(|id| !ids.iter().any(|gone| gone == id));
        }
        for record in &removed {
            self.events.push(DomainEvent::Removed { collection, id: record.id().to_string() });
        }
        info!(%collection, count = removed.len(), "records deleted");
        Ok(removed)
    }

    /// Applies one intent to every id and commits all results together.
    /// The first failing record rejects the whole batch.
    #[instrument(skip(self, ids, intent), fields(collection = %T::COLLECTION, count = ids.len()))]
    pub fn bulk_apply<T: BulkEditable>(&mut self, ids: &[String], intent: &T::Intent) -> Result<Vec<T>> {
        if ids.is_empty() { return Err(ConsoleError::SelectionEmpty); }
        let now = self.clock.now();
        let mut updated = Vec::with_capacity(ids.len());
        let mut events = Vec::new();
        for id in ids {
            let rejected = |source: ConsoleError| ConsoleError::BatchRejected { record_id: id.clone(), source: Box::new(source) };
            let base = self.store.get::<T>(id).map_err(rejected)?;
            let mut next = base.apply_intent(intent, now).map_err(|e| {
                warn!(id = %id, error = %e, "bulk edit rejected");
                rejected(e)
            })?;
            events.extend(next.take_events());
            updated.push(next);
        }
        self.record_events(events);
        self.store.upsert_many(updated.clone());
        info!(count = updated.len(), "bulk edit committed");
        Ok(updated)
    }

    /// Dispatches an action over the current selection of `T`'s collection.
    pub fn run_bulk_action<T: BulkEditable>(&mut self, action: BulkAction<T::Intent>) -> Result<BulkOutcome<T>> {
        let ids = self.selection(T::COLLECTION).map(|s| s.ids().to_vec()).unwrap_or_default();
        match action {
            BulkAction::Delete => self.request_delete(T::COLLECTION, &ids).map(BulkOutcome::AwaitingConfirmation),
            BulkAction::Edit(intent) => self.bulk_apply::<T>(&ids, &intent).map(BulkOutcome::Applied),
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn record_events(&mut self, events: Vec<DomainEvent>) {
        for event in &events {
            debug!(?event, "domain event");
        }
        self.events.extend(events);
    }

    pub fn drain_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::{Adjustment, ProductIntent, TicketIntent};
    use crate::domain::aggregates::{
        LineItemInput, OrderStatus, RequestedProduct, RfqStatus, TicketCategory, TicketPriority, TicketStatus,
    };
    use crate::domain::events::RfqEvent;
    use crate::domain::value_objects::Customer;
    use crate::pipeline::LiveView;
    use rust_decimal_macros::dec;

    fn console() -> (Console, FixedClock) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        (Console::with_clock(ConsoleConfig::default(), clock.clone()), clock)
    }

    fn rfq_draft(company: &str) -> RfqDraft {
        RfqDraft {
            company: company.into(), contact_name: "Dana Reyes".into(), email: "dana@acme.test".into(),
            products: vec![RequestedProduct { name: "Plush bear".into(), quantity: 500, specification: "30cm".into() }],
            estimated_value: dec!(12500), deadline: Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap(),
            ..Default::default()
        }
    }

    fn order_draft() -> OrderDraft {
        OrderDraft {
            customer: Customer { company: "Bright Kids".into(), contact_name: "Sam Ortiz".into(), email: "sam@bright.test".into(), phone: None },
            line_items: vec![LineItemInput { name: "Widget".into(), variant: None, unit_price: dec!(10), quantity: 2 }],
            ..Default::default()
        }
    }

    fn ticket_draft(description_len: usize) -> TicketDraft {
        TicketDraft {
            subject: "Parcel arrived damaged".into(), category: Some(TicketCategory::Shipping),
            description: "x".repeat(description_len), requester: Some("dana@acme.test".into()),
            ..Default::default()
        }
    }

    fn product(console: &mut Console, id: &str, inventory: u32) -> Product {
        console.create_product(ProductDraft {
            id: Some(id.into()), title: format!("Product {}", id), sku: format!("SKU-{}", id),
            price: dec!(20), inventory, ..Default::default()
        }).unwrap()
    }

    #[test]
    fn test_accept_rfq_through_console() {
        let (mut c, _) = console();
        let rfq = c.create_rfq(rfq_draft("Acme")).unwrap();
        assert_eq!(rfq.rfq_number(), "RFQ-2026-0001");
        let before = rfq.history().len();

        let Record::Rfq(accepted) = c.transition(Collection::Rfqs, rfq.id(), Transition::Accept).unwrap() else { panic!("expected rfq") };
        assert_eq!(accepted.status(), RfqStatus::Accepted);
        assert_eq!(accepted.history().len(), before + 1);
        assert_eq!(c.get::<Rfq>(rfq.id()).unwrap().status(), RfqStatus::Accepted);

        let err = c.transition(Collection::Rfqs, rfq.id(), Transition::Accept).unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidTransition { .. }));
        assert!(c.drain_events().iter().any(|e| matches!(e, DomainEvent::Rfq(RfqEvent::StatusChanged { .. }))));
    }

    #[test]
    fn test_transition_for_wrong_collection_is_rejected() {
        let (mut c, _) = console();
        let rfq = c.create_rfq(rfq_draft("Acme")).unwrap();
        let revision = c.store().revision();
        let err = c.transition(Collection::Rfqs, rfq.id(), Transition::MarkPaid).unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidTransition { .. }));
        assert_eq!(c.store().revision(), revision);
        assert!(matches!(c.transition(Collection::Orders, "nope", Transition::MarkPaid), Err(ConsoleError::NotFound { .. })));
    }

    #[test]
    fn test_decline_needs_confirmation() {
        let (mut c, _) = console();
        let rfq = c.create_rfq(rfq_draft("Acme")).unwrap();

        let token = c.request_decline(rfq.id()).unwrap();
        assert_eq!(c.get::<Rfq>(rfq.id()).unwrap().status(), RfqStatus::Pending);
        c.cancel(token).unwrap();
        assert!(c.confirm_decline(token).is_err());
        assert_eq!(c.get::<Rfq>(rfq.id()).unwrap().status(), RfqStatus::Pending);

        let token = c.request_decline(rfq.id()).unwrap();
        let declined = c.confirm_decline(token).unwrap();
        assert_eq!(declined.status(), RfqStatus::Expired);
        assert!(c.request_decline(rfq.id()).is_err());
    }

    #[test]
    fn test_order_flow_keeps_delivery_after_shipping() {
        let (mut c, clock) = console();
        let order = c.create_order(order_draft()).unwrap();
        assert_eq!(order.order_number(), "ORD-2026-0001");
        let id = order.id().to_string();

        c.transition(Collection::Orders, &id, Transition::MarkPaid).unwrap();
        c.transition(Collection::Orders, &id, Transition::MarkFulfilled).unwrap();
        clock.advance(chrono::Duration::hours(2));
        c.transition(Collection::Orders, &id, Transition::AddTracking(TrackingInput::new("1Z999", "UPS"))).unwrap();
        c.transition(Collection::Orders, &id, Transition::MarkDelivered).unwrap();

        let order = c.get::<Order>(&id).unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
        let tracking = order.tracking().unwrap();
        assert!(tracking.delivered_at.unwrap() >= tracking.shipped_at);
    }

    #[test]
    fn test_tracking_rejected_before_fulfillment() {
        let (mut c, _) = console();
        let id = c.create_order(order_draft()).unwrap().id().to_string();
        let err = c.transition(Collection::Orders, &id, Transition::AddTracking(TrackingInput::new("1Z999", "UPS"))).unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidTransition { .. }));
        assert!(c.get::<Order>(&id).unwrap().tracking().is_none());
    }

    #[test]
    fn test_ticket_ids_and_description_length() {
        let (mut c, _) = console();
        assert!(matches!(c.open_ticket(ticket_draft(40)), Err(ConsoleError::Validation(_))));
        assert_eq!(c.store().len(Collection::Tickets), 0);

        let first = c.open_ticket(ticket_draft(50)).unwrap();
        let second = c.open_ticket(ticket_draft(60)).unwrap();
        assert_eq!(first.id(), "TKT-2026-0001");
        assert_eq!(second.id(), "TKT-2026-0002");
        assert_eq!(first.status(), TicketStatus::Open);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (mut c, _) = console();
        product(&mut c, "P1", 5);
        let err = c.create_product(ProductDraft { id: Some("P1".into()), title: "Dup".into(), sku: "DUP".into(), ..Default::default() }).unwrap_err();
        let ConsoleError::Validation(fields) = err else { panic!("expected validation error") };
        assert!(fields.contains("id"));
    }

    #[test]
    fn test_bulk_edit_is_all_or_nothing() {
        let (mut c, _) = console();
        for (id, stock) in [("P1", 10), ("P2", 3), ("P3", 8)] {
            product(&mut c, id, stock);
        }
        c.drain_events();
        let revision = c.store().revision();
        let ids: Vec<String> = ["P1", "P2", "P3"].iter().map(|s| s.to_string()).collect();
        let intent = ProductIntent { inventory: Adjustment::increase(dec!(-5)), ..Default::default() };

        let err = c.bulk_apply::<Product>(&ids, &intent).unwrap_err();
        assert!(matches!(err, ConsoleError::BatchRejected { ref record_id, .. } if record_id == "P2"));
        assert_eq!(c.store().revision(), revision);
        assert_eq!(c.get::<Product>("P1").unwrap().inventory().value(), 10);
        assert_eq!(c.get::<Product>("P3").unwrap().inventory().value(), 8);
        assert!(c.drain_events().is_empty());

        let intent = ProductIntent { inventory: Adjustment::decrease(dec!(5)), ..Default::default() };
        let updated = c.bulk_apply::<Product>(&ids, &intent).unwrap();
        let stock: Vec<u32> = updated.iter().map(|p| p.inventory().value()).collect();
        assert_eq!(stock, [5, 0, 3]);
        assert_eq!(c.store().revision(), revision + 1);
        assert_eq!(c.drain_events().len(), 3);
    }

    #[test]
    fn test_bulk_action_uses_selection() {
        let (mut c, _) = console();
        let a = c.open_ticket(ticket_draft(50)).unwrap();
        let b = c.open_ticket(ticket_draft(50)).unwrap();

        let err = c.run_bulk_action::<Ticket>(BulkAction::Edit(TicketIntent::default())).unwrap_err();
        assert!(matches!(err, ConsoleError::SelectionEmpty));

        c.selection_mut(Collection::Tickets).select_all([a.id(), b.id()]);
        let intent = TicketIntent { priority: Some(TicketPriority::Urgent), category: None };
        let BulkOutcome::Applied(updated) = c.run_bulk_action::<Ticket>(BulkAction::Edit(intent)).unwrap() else { panic!("expected edit") };
        assert!(updated.iter().all(|t| t.priority() == TicketPriority::Urgent && t.category() == TicketCategory::Shipping));
    }

    #[test]
    fn test_delete_requires_confirmation_and_refreshes_views() {
        let (mut c, _) = console();
        for id in ["P1", "P2", "P3"] {
            product(&mut c, id, 1);
        }
        let mut live = LiveView::<Product>::new(ViewQuery::new());
        assert_eq!(live.ids(c.store()).len(), 3);

        c.selection_mut(Collection::Products).select_all(["P1", "P3"]);
        c.set_selected(Some((Collection::Products, "P1"))).unwrap();
        let BulkOutcome::AwaitingConfirmation(token) = c.run_bulk_action::<Product>(BulkAction::Delete).unwrap() else { panic!("expected token") };
        assert_eq!(c.store().len(Collection::Products), 3);

        let removed = c.confirm_delete(token).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(live.ids(c.store()), ["P2"]);
        assert!(c.selection(Collection::Products).unwrap().is_empty());
        assert!(c.selected_record().is_none());
        assert!(matches!(c.confirm_delete(token), Err(ConsoleError::UnknownConfirmation(_))));
    }

    #[test]
    fn test_confirm_with_wrong_kind_keeps_token() {
        let (mut c, _) = console();
        let rfq = c.create_rfq(rfq_draft("Acme")).unwrap();
        let token = c.request_decline(rfq.id()).unwrap();
        assert!(matches!(c.confirm_delete(token), Err(ConsoleError::UnknownConfirmation(_))));
        assert!(c.pending(token).is_some());
    }

    #[test]
    fn test_view_records_filters_and_sorts() {
        let (mut c, _) = console();
        c.create_rfq(rfq_draft("zeta")).unwrap();
        c.create_rfq(rfq_draft("Alpha")).unwrap();
        let rows = c.view::<Rfq>(&ViewQuery::new().sort_by(crate::pipeline::SortKey::Company, crate::pipeline::SortDirection::Ascending));
        let companies: Vec<&str> = rows.iter().map(|r| r.customer().company.as_str()).collect();
        assert_eq!(companies, ["Alpha", "zeta"]);
        assert_eq!(c.view_records(Collection::Rfqs, &ViewQuery::new().search("ALP")).len(), 1);
    }

    #[test]
    fn test_transition_payload_from_json() {
        let t: Transition = serde_json::from_str(r#"{"operation":"add_tracking","payload":{"number":"1Z","carrier":"UPS"}}"#).unwrap();
        assert_eq!(t.name(), "add_tracking");
        let t: Transition = serde_json::from_str(r#"{"operation":"mark_paid"}"#).unwrap();
        assert_eq!(t.name(), "mark_paid");
    }
}
