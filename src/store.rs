//! Entity store: the single writable owner of console records.
//!
//! Every write replaces a whole record. Readers get shared references or
//! clones, so a record is either entirely old or entirely new to them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use crate::domain::aggregates::{Order, Product, Rfq, Ticket};
use crate::{ConsoleError, FieldErrors, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection { Rfqs, Orders, Tickets, Products }

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Rfqs => "rfqs", Self::Orders => "orders", Self::Tickets => "tickets", Self::Products => "products" }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A record from any collection.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "collection", content = "record", rename_all = "snake_case")]
pub enum Record {
    Rfq(Rfq),
    Order(Order),
    Ticket(Ticket),
    Product(Product),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::Rfq(_) => Collection::Rfqs,
            Record::Order(_) => Collection::Orders,
            Record::Ticket(_) => Collection::Tickets,
            Record::Product(_) => Collection::Products,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Rfq(r) => r.id(),
            Record::Order(o) => o.id(),
            Record::Ticket(t) => t.id(),
            Record::Product(p) => &p.id,
        }
    }
}

/// A record type that lives in one collection of the store.
pub trait Entity: Clone + Into<Record> {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
    /// Record-level rules checked when records arrive from outside.
    fn violations(&self) -> FieldErrors;
    fn table(store: &EntityStore) -> &Table<Self>;
    fn table_mut(store: &mut EntityStore) -> &mut Table<Self>;
}

macro_rules! entity {
    ($ty:ty, $variant:ident, $collection:ident, $field:ident, |$r:ident| $id:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = Collection::$collection;

            fn id(&self) -> &str { let $r = self; $id }
            fn violations(&self) -> FieldErrors { <$ty>::violations(self) }
            fn table(store: &EntityStore) -> &Table<Self> { &store.$field }
            fn table_mut(store: &mut EntityStore) -> &mut Table<Self> { &mut store.$field }
        }

        impl From<$ty> for Record {
            fn from(value: $ty) -> Self { Record::$variant(value) }
        }
    };
}

entity!(Rfq, Rfq, Rfqs, rfqs, |r| r.id());
entity!(Order, Order, Orders, orders, |r| r.id());
entity!(Ticket, Ticket, Tickets, tickets, |r| r.id());
entity!(Product, Product, Products, products, |r| &r.id);

/// Insertion-ordered rows of one collection.
#[derive(Clone, Debug)]
pub struct Table<T> {
    rows: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self { Self { rows: Vec::new() } }
}

impl<T: Entity> Table<T> {
    pub fn rows(&self) -> &[T] { &self.rows }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
    pub fn get(&self, id: &str) -> Option<&T> { self.rows.iter().find(|r| r.id() == id) }
    fn position(&self, id: &str) -> Option<usize> { self.rows.iter().position(|r| r.id() == id) }

    /// Replaces in place (keeping the row's position) or appends.
    fn upsert(&mut self, record: T) {
        match self.position(record.id()) {
            Some(i) => self.rows[i] = record,
            None => self.rows.push(record),
        }
    }

    fn remove(&mut self, id: &str) -> Option<T> { self.position(id).map(|i| self.rows.remove(i)) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Selected {
    pub collection: Collection,
    pub id: String,
}

/// Serializable dump of every collection, used for seeding.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub rfqs: Vec<Rfq>,
    pub orders: Vec<Order>,
    pub tickets: Vec<Ticket>,
    pub products: Vec<Product>,
}

#[derive(Clone, Debug, Default)]
pub struct EntityStore {
    rfqs: Table<Rfq>,
    orders: Table<Order>,
    tickets: Table<Ticket>,
    products: Table<Product>,
    selected: Option<Selected>,
    revision: u64,
}

impl EntityStore {
    pub fn new() -> Self { Self::default() }

    /// Builds a store from collaborator data. Any record that breaks its
    /// aggregate's rules rejects the whole snapshot; errors are keyed
    /// `collection/id.field`.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let mut errors = FieldErrors::new();
        check_rows(&snapshot.rfqs, &mut errors);
        check_rows(&snapshot.orders, &mut errors);
        check_rows(&snapshot.tickets, &mut errors);
        check_rows(&snapshot.products, &mut errors);
        if !errors.is_empty() {
            warn!(%errors, "snapshot rejected");
            return Err(ConsoleError::Validation(errors));
        }
        let mut store = Self::new();
        store.upsert_many(snapshot.rfqs);
        store.upsert_many(snapshot.orders);
        store.upsert_many(snapshot.tickets);
        store.upsert_many(snapshot.products);
        Ok(store)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            rfqs: self.rfqs.rows.clone(),
            orders: self.orders.rows.clone(),
            tickets: self.tickets.rows.clone(),
            products: self.products.rows.clone(),
        }
    }

    /// Bumped once per committed write; views recompute when it moves.
    pub fn revision(&self) -> u64 { self.revision }

    pub fn all<T: Entity>(&self) -> &[T] { T::table(self).rows() }

    pub fn len(&self, collection: Collection) -> usize {
        match collection {
            Collection::Rfqs => self.rfqs.len(),
            Collection::Orders => self.orders.len(),
            Collection::Tickets => self.tickets.len(),
            Collection::Products => self.products.len(),
        }
    }

    pub fn contains<T: Entity>(&self, id: &str) -> bool { T::table(self).get(id).is_some() }

    pub fn get<T: Entity>(&self, id: &str) -> Result<&T> {
        T::table(self).get(id).ok_or_else(|| ConsoleError::not_found(T::COLLECTION, id))
    }

    /// Cloned snapshot of any record.
    pub fn get_record(&self, collection: Collection, id: &str) -> Result<Record> {
        match collection {
            Collection::Rfqs => self.get::<Rfq>(id).map(|r| r.clone().into()),
            Collection::Orders => self.get::<Order>(id).map(|r| r.clone().into()),
            Collection::Tickets => self.get::<Ticket>(id).map(|r| r.clone().into()),
            Collection::Products => self.get::<Product>(id).map(|r| r.clone().into()),
        }
    }

    pub fn upsert<T: Entity>(&mut self, record: T) { self.upsert_many(vec![record]); }

    /// Writes every record as one commit.
    pub fn upsert_many<T: Entity>(&mut self, records: Vec<T>) {
        if records.is_empty() { return; }
        let count = records.len();
        let table = T::table_mut(self);
        for record in records {
            table.upsert(record);
        }
        self.revision += 1;
        debug!(collection = %T::COLLECTION, count, revision = self.revision, "upserted records");
    }

    pub fn remove<T: Entity>(&mut self, id: &str) -> Result<T> {
        self.remove_many::<T>(&[id.to_string()]).map(|mut removed| removed.remove(0))
    }

    /// Removes all of `ids` or none of them.
    pub fn remove_many<T: Entity>(&mut self, ids: &[String]) -> Result<Vec<T>> {
        if let Some(missing) = ids.iter().find(|id| !self.contains::<T>(id)) {
            return Err(ConsoleError::not_found(T::COLLECTION, missing.as_str()));
        }
        let table = T::table_mut(self);
        let removed: Vec<T> = ids.iter().filter_map(|id| table.remove(id)).collect();
        if self.selected.as_ref().is_some_and(|s| s.collection == T::COLLECTION && ids.contains(&s.id)) {
            self.selected = None;
        }
        self.revision += 1;
        debug!(collection = %T::COLLECTION, count = removed.len(), revision = self.revision, "removed records");
        Ok(removed)
    }

    /// Points the detail pane at a record, or clears it with `None`.
    pub fn set_selected(&mut self, selected: Option<(Collection, &str)>) -> Result<()> {
        self.selected = match selected {
            Some((collection, id)) => {
                self.get_record(collection, id)?;
                Some(Selected { collection, id: id.to_string() })
            }
            None => None,
        };
        Ok(())
    }

    pub fn selected(&self) -> Option<&Selected> { self.selected.as_ref() }

    pub fn selected_record(&self) -> Option<Record> {
        self.selected.as_ref().and_then(|s| self.get_record(s.collection, &s.id).ok())
    }
}

fn check_rows<T: Entity>(rows: &[T], errors: &mut FieldErrors) {
    let mut seen = HashSet::new();
    for row in rows {
        let key = format!("{}/{}", T::COLLECTION, row.id());
        if !seen.insert(row.id()) {
            errors.push(&key, "duplicate id");
        }
        errors.merge(row.violations().nested(&key));
    }
}

/// Next `PREFIX-YYYY-NNNN` identifier; the sequence restarts every year.
pub fn next_sequence<'a>(prefix: &str, year: i32, existing: impl Iterator<Item = &'a str>) -> String {
    let scope = format!("{}-{}-", prefix, year);
    let last = existing
        .filter_map(|id| id.strip_prefix(scope.as_str()))
        .filter_map(|seq| seq.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{:04}", scope, last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ProductDraft;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product(id: &str, title: &str) -> Product {
        let draft = ProductDraft { title: title.into(), sku: format!("SKU-{}", id), price: dec!(10), ..Default::default() };
        Product::create(draft, id.into(), "USD", Utc::now()).unwrap()
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut store = EntityStore::new();
        store.upsert_many(vec![product("a", "A"), product("b", "B"), product("c", "C")]);
        let mut b = store.get::<Product>("b").unwrap().clone();
        b.title = "B2".into();
        store.upsert(b);
        let titles: Vec<_> = store.all::<Product>().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B2", "C"]);
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_get_missing() {
        let store = EntityStore::new();
        let err = store.get::<Product>("nope").unwrap_err();
        assert!(matches!(err, ConsoleError::NotFound { collection: Collection::Products, .. }));
    }

    #[test]
    fn test_remove_many_is_all_or_nothing() {
        let mut store = EntityStore::new();
        store.upsert_many(vec![product("a", "A"), product("b", "B")]);
        let err = store.remove_many::<Product>(&["a".into(), "zzz".into()]).unwrap_err();
        assert!(matches!(err, ConsoleError::NotFound { .. }));
        assert_eq!(store.len(Collection::Products), 2);
        store.remove_many::<Product>(&["a".into(), "b".into()]).unwrap();
        assert_eq!(store.len(Collection::Products), 0);
    }

    #[test]
    fn test_remove_clears_selection() {
        let mut store = EntityStore::new();
        store.upsert(product("a", "A"));
        store.set_selected(Some((Collection::Products, "a"))).unwrap();
        assert!(store.selected_record().is_some());
        store.remove::<Product>("a").unwrap();
        assert!(store.selected().is_none());
        assert!(store.set_selected(Some((Collection::Products, "a"))).is_err());
    }

    #[test]
    fn test_snapshot_rejects_invalid_records() {
        let mut bad = product("b", "B");
        bad.price = crate::domain::value_objects::Money::new(dec!(-2), "USD");
        let snapshot = StoreSnapshot { products: vec![product("a", "A"), bad, product("a", "A again")], ..Default::default() };
        let err = EntityStore::from_snapshot(snapshot).unwrap_err();
        let ConsoleError::Validation(fields) = err else { panic!("expected validation error") };
        assert!(fields.contains("products/b.price"));
        assert!(fields.contains("products/a"));

        let store = EntityStore::from_snapshot(StoreSnapshot { products: vec![product("a", "A")], ..Default::default() }).unwrap();
        assert_eq!(store.len(Collection::Products), 1);
    }

    #[test]
    fn test_snapshot_order_with_impossible_state() {
        let json = r#"{"orders":[{
            "id":"O1","order_number":"ORD-2026-0001",
            "customer":{"company":"Bright","contact_name":"Sam","email":"sam@bright.test","phone":null},
            "items":[{"name":"Widget","variant":null,"unit_price":{"amount":"-5","currency":"USD"},"quantity":0}],
            "discount":{"amount":"0","currency":"USD"},"shipping":{"amount":"0","currency":"USD"},"tax_rate":"0.08",
            "payment":"unpaid","fulfillment":"unfulfilled","shipment":"delivered","tracking":null,
            "shipping_address":{"name":"","street1":"","street2":null,"city":"","state":null,"zip":"","country":""},
            "created_at":"2026-03-01T09:00:00Z","updated_at":"2026-03-01T09:00:00Z","history":[]
        }]}"#;
        let snapshot: StoreSnapshot = serde_json::from_str(json).unwrap();
        let err = EntityStore::from_snapshot(snapshot).unwrap_err();
        let ConsoleError::Validation(fields) = err else { panic!("expected validation error") };
        assert!(fields.contains("orders/O1.shipment"));
        assert!(fields.contains("orders/O1.items"));
    }

    #[test]
    fn test_next_sequence() {
        let ids = ["TKT-2025-0007", "TKT-2026-0001", "TKT-2026-0012", "other"];
        assert_eq!(next_sequence("TKT", 2026, ids.iter().copied()), "TKT-2026-0013");
        assert_eq!(next_sequence("TKT", 2027, ids.iter().copied()), "TKT-2027-0001");
    }
}
