//! Filter/sort pipeline.
//!
//! `view` is a pure function of its inputs: the same rows and query always
//! give the same order, ties included. `LiveView` caches one query's result
//! against the store revision and recomputes from scratch when it moves.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

use crate::domain::aggregates::{Order, Product, Rfq, Ticket};
use crate::store::{Entity, EntityStore};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection { #[default] Ascending, Descending }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// RFQ/order number, ticket id, product SKU.
    Reference,
    Company,
    Customer,
    Subject,
    Title,
    Priority,
    CreatedAt,
    UpdatedAt,
    Deadline,
    EstimatedValue,
    Total,
    Price,
    Inventory,
}

/// Comparable projection of one field.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Text(String),
    Time(DateTime<Utc>),
    Number(Decimal),
}

impl SortValue {
    /// Case-folded so "acme" and "Acme" sort together.
    pub fn text(value: &str) -> Self { SortValue::Text(value.to_lowercase()) }
}

/// Filter predicates plus sort order. Empty or `"all"` filters are no-ops.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewQuery {
    pub search: String,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub sort: Option<SortKey>,
    pub direction: SortDirection,
}

impl ViewQuery {
    pub fn new() -> Self { Self::default() }
    pub fn search(mut self, text: impl Into<String>) -> Self { self.search = text.into(); self }
    pub fn status(mut self, status: impl Into<String>) -> Self { self.status = status.into(); self }
    pub fn priority(mut self, priority: impl Into<String>) -> Self { self.priority = priority.into(); self }
    pub fn category(mut self, category: impl Into<String>) -> Self { self.category = category.into(); self }
    pub fn sort_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort = Some(key);
        self.direction = direction;
        self
    }
}

/// A record that can be listed in a console view.
pub trait Viewable: Entity {
    /// Fields searched by the free-text box.
    fn search_fields(&self) -> Vec<&str>;
    fn status_label(&self) -> &str;
    fn priority_label(&self) -> Option<&str> { None }
    fn category_label(&self) -> Option<&str> { None }
    /// `None` when the record has no such field; those sort first.
    fn sort_value(&self, key: SortKey) -> Option<SortValue>;
}

fn is_noop(filter: &str) -> bool {
    let filter = filter.trim();
    filter.is_empty() || filter.eq_ignore_ascii_case("all")
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase().replace(['-', ' '], "_")
}

fn label_matches(filter: &str, label: Option<&str>) -> bool {
    is_noop(filter) || label.is_some_and(|l| normalize(l) == normalize(filter))
}

fn search_matches<T: Viewable>(record: &T, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() { return true; }
    let needle = needle.to_lowercase();
    record.search_fields().iter().any(|field| field.to_lowercase().contains(&needle))
}

pub fn matches<T: Viewable>(record: &T, query: &ViewQuery) -> bool {
    search_matches(record, &query.search)
        && label_matches(&query.status, Some(record.status_label()))
        && label_matches(&query.priority, record.priority_label())
        && label_matches(&query.category, record.category_label())
}

/// Filters, then stable-sorts. Descending flips the comparator rather than
/// reversing the output, so equal keys keep their input order either way.
pub fn view<'a, T: Viewable>(rows: &'a [T], query: &ViewQuery) -> Vec<&'a T> {
    let mut out: Vec<&T> = rows.iter().filter(|r| matches(*r, query)).collect();
    if let Some(key) = query.sort {
        let mut keyed: Vec<(Option<SortValue>, &T)> = out.into_iter().map(|r| (r.sort_value(key), r)).collect();
        keyed.sort_by(|(a, _), (b, _)| match query.direction {
            SortDirection::Ascending => a.cmp(b),
            SortDirection::Descending => b.cmp(a),
        });
        out = keyed.into_iter().map(|(_, r)| r).collect();
    }
    out
}

/// A query bound to one collection, recomputed whenever the store changes.
#[derive(Clone, Debug)]
pub struct LiveView<T> {
    query: ViewQuery,
    computed_at: Option<u64>,
    ids: Vec<String>,
    _entity: PhantomData<T>,
}

impl<T: Viewable> LiveView<T> {
    pub fn new(query: ViewQuery) -> Self {
        Self { query, computed_at: None, ids: Vec::new(), _entity: PhantomData }
    }

    pub fn query(&self) -> &ViewQuery { &self.query }

    pub fn set_query(&mut self, query: ViewQuery) {
        if query != self.query {
            self.query = query;
            self.computed_at = None;
        }
    }

    pub fn ids(&mut self, store: &EntityStore) -> &[String] {
        if self.computed_at != Some(store.revision()) {
            self.ids = view(store.all::<T>(), &self.query).into_iter().map(|r| r.id().to_string()).collect();
            self.computed_at = Some(store.revision());
            debug!(collection = %T::COLLECTION, rows = self.ids.len(), revision = store.revision(), "recomputed view");
        }
        &self.ids
    }

    pub fn records<'s>(&mut self, store: &'s EntityStore) -> Vec<&'s T> {
        let ids = self.ids(store).to_vec();
        ids.iter().filter_map(|id| store.get::<T>(id).ok()).collect()
    }
}

impl Viewable for Rfq {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.customer().contact_name.as_str(), self.customer().company.as_str(), self.rfq_number()]
    }
    fn status_label(&self) -> &str { self.status().as_str() }
    fn priority_label(&self) -> Option<&str> { Some(self.priority().as_str()) }
    fn sort_value(&self, key: SortKey) -> Option<SortValue> {
        match key {
            SortKey::Reference => Some(SortValue::text(self.rfq_number())),
            SortKey::Company => Some(SortValue::text(&self.customer().company)),
            SortKey::Customer => Some(SortValue::text(&self.customer().contact_name)),
            SortKey::Priority => Some(SortValue::Number(Decimal::from(self.priority() as u8))),
            SortKey::CreatedAt => Some(SortValue::Time(self.created_at())),
            SortKey::Deadline => Some(SortValue::Time(self.deadline())),
            SortKey::EstimatedValue => Some(SortValue::Number(self.estimated_value().amount())),
            _ => None,
        }
    }
}

impl Viewable for Order {
    fn search_fields(&self) -> Vec<&str> {
        let customer = self.customer();
        vec![self.order_number(), customer.company.as_str(), customer.contact_name.as_str(), customer.email.as_str()]
    }
    fn status_label(&self) -> &str { self.status().as_str() }
    fn sort_value(&self, key: SortKey) -> Option<SortValue> {
        match key {
            SortKey::Reference => Some(SortValue::text(self.order_number())),
            SortKey::Company => Some(SortValue::text(&self.customer().company)),
            SortKey::Customer => Some(SortValue::text(&self.customer().contact_name)),
            SortKey::CreatedAt => Some(SortValue::Time(self.created_at())),
            SortKey::UpdatedAt => Some(SortValue::Time(self.updated_at())),
            SortKey::Total => Some(SortValue::Number(self.total().amount())),
            _ => None,
        }
    }
}

impl Viewable for Ticket {
    fn search_fields(&self) -> Vec<&str> { vec![self.id(), self.subject()] }
    fn status_label(&self) -> &str { self.status().as_str() }
    fn priority_label(&self) -> Option<&str> { Some(self.priority().as_str()) }
    fn category_label(&self) -> Option<&str> { Some(self.category().as_str()) }
    fn sort_value(&self, key: SortKey) -> Option<SortValue> {
        match key {
            SortKey::Reference => Some(SortValue::text(self.id())),
            SortKey::Subject => Some(SortValue::text(self.subject())),
            SortKey::Priority => Some(SortValue::Number(Decimal::from(self.priority() as u8))),
            SortKey::CreatedAt => Some(SortValue::Time(self.created_at())),
            SortKey::UpdatedAt => Some(SortValue::Time(self.updated_at())),
            _ => None,
        }
    }
}

impl Viewable for Product {
    fn search_fields(&self) -> Vec<&str> { vec![self.title.as_str(), self.sku.as_str()] }
    fn status_label(&self) -> &str { self.status.as_str() }
    fn category_label(&self) -> Option<&str> { Some(self.category.as_str()) }
    fn sort_value(&self, key: SortKey) -> Option<SortValue> {
        match key {
            SortKey::Reference => Some(SortValue::text(self.sku.as_str())),
            SortKey::Title => Some(SortValue::text(&self.title)),
            SortKey::Price => Some(SortValue::Number(self.price.amount())),
            SortKey::Inventory => Some(SortValue::Number(Decimal::from(self.inventory.value()))),
            SortKey::CreatedAt => Some(SortValue::Time(self.created_at)),
            SortKey::UpdatedAt => Some(SortValue::Time(self.updated_at)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{ProductDraft, ProductStatus, RequestedProduct, RfqDraft, RfqPriority};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn rfq(id: &str, company: &str, contact: &str, value: Decimal, day: u32) -> Rfq {
        let draft = RfqDraft {
            company: company.into(), contact_name: contact.into(), email: "buyer@example.test".into(),
            products: vec![RequestedProduct { name: "Blocks".into(), quantity: 10, specification: String::new() }],
            estimated_value: value, priority: RfqPriority::Medium,
            deadline: Utc.with_ymd_and_hms(2026, 11, day, 0, 0, 0).unwrap(),
            ..Default::default()
        };
        let created = Utc.with_ymd_and_hms(2026, 10, day, 9, 0, 0).unwrap();
        Rfq::create(draft, id.into(), format!("RFQ-2026-{:04}", day), "USD", created).unwrap()
    }

    fn rows() -> Vec<Rfq> {
        vec![
            rfq("1", "Zeta Toys", "Ana", dec!(500), 3),
            rfq("2", "acme", "Bo", dec!(100), 1),
            rfq("3", "Beta Kids", "Cy", dec!(500), 2),
            rfq("4", "Acme", "Di", dec!(100), 4),
        ]
    }

    fn ids(records: &[&Rfq]) -> Vec<String> { records.iter().map(|r| r.id().to_string()).collect() }

    #[test]
    fn test_view_is_pure() {
        let rows = rows();
        let query = ViewQuery::new().sort_by(SortKey::EstimatedValue, SortDirection::Descending);
        assert_eq!(ids(&view(&rows, &query)), ids(&view(&rows, &query)));
    }

    #[test]
    fn test_stable_sort_both_directions() {
        let rows = rows();
        let asc = view(&rows, &ViewQuery::new().sort_by(SortKey::EstimatedValue, SortDirection::Ascending));
        assert_eq!(ids(&asc), vec!["2", "4", "1", "3"]);
        let desc = view(&rows, &ViewQuery::new().sort_by(SortKey::EstimatedValue, SortDirection::Descending));
        assert_eq!(ids(&desc), vec!["1", "3", "2", "4"]);
    }

    #[test]
    fn test_text_sort_is_case_insensitive() {
        let rows = rows();
        let asc = view(&rows, &ViewQuery::new().sort_by(SortKey::Company, SortDirection::Ascending));
        assert_eq!(ids(&asc), vec!["2", "4", "3", "1"]);
    }

    #[test]
    fn test_timestamp_sort() {
        let rows = rows();
        let desc = view(&rows, &ViewQuery::new().sort_by(SortKey::CreatedAt, SortDirection::Descending));
        assert_eq!(ids(&desc), vec!["4", "1", "3", "2"]);
        let deadline = view(&rows, &ViewQuery::new().sort_by(SortKey::Deadline, SortDirection::Ascending));
        assert_eq!(ids(&deadline), vec!["2", "3", "1", "4"]);
    }

    #[test]
    fn test_filters_are_anded() {
        let mut rows = rows();
        rows[3].accept(Utc::now()).unwrap();
        let all = view(&rows, &ViewQuery::new().search("ACME").status("all"));
        assert_eq!(ids(&all), vec!["2", "4"]);
        let pending = view(&rows, &ViewQuery::new().search("acme").status("pending"));
        assert_eq!(ids(&pending), vec!["2"]);
        let by_contact = view(&rows, &ViewQuery::new().search("cy"));
        assert_eq!(ids(&by_contact), vec!["3"]);
        assert!(view(&rows, &ViewQuery::new().priority("high")).is_empty());
    }

    #[test]
    fn test_live_view_recomputes_after_remove() {
        let mut store = EntityStore::new();
        let now = Utc::now();
        let products: Vec<Product> = ["Kite", "Yo-yo", "Kazoo"].iter().enumerate().map(|(i, title)| {
            let draft = ProductDraft { title: title.to_string(), sku: format!("S{}", i), price: dec!(5), status: ProductStatus::Active, ..Default::default() };
            Product::create(draft, format!("p{}", i), "USD", now + Duration::seconds(i as i64)).unwrap()
        }).collect();
        store.upsert_many(products);
        let mut live = LiveView::<Product>::new(ViewQuery::new().search("k").sort_by(SortKey::Title, SortDirection::Ascending));
        assert_eq!(live.ids(&store), ["p2".to_string(), "p0".to_string()]);
        store.remove::<Product>("p2").unwrap();
        assert_eq!(live.ids(&store), ["p0".to_string()]);
        assert_eq!(live.records(&store).len(), 1);
    }
}
