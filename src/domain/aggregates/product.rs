//! Product Aggregate
//!
//! Products carry no status machine. Their content fields are only changed
//! by bulk edits, which build a fresh record rather than patching in place.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, Quantity, Sku};
use crate::{non_negative, not_blank, ConsoleError, FieldErrors, Result};

/// Fields are crate-visible so the bulk calculator can build edited copies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) category: String,
    pub(crate) sub_category: String,
    pub(crate) sku: Sku,
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) specification: Specification,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    pub(crate) price: Money,
    pub(crate) compare_at_price: Option<Money>,
    pub(crate) mrp: Option<Money>,
    pub(crate) cost: Option<Money>,
    pub(crate) inventory: Quantity,
    #[serde(default)]
    pub(crate) images: Vec<ProductImage>,
    #[serde(default)]
    pub(crate) variants: Vec<Variant>,
    #[serde(default)]
    pub(crate) seo: SeoData,
    pub(crate) status: ProductStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)] pub struct Variant { pub id: String, pub title: String, pub sku: Option<String>, pub price: Option<Money>, pub images: Vec<ProductImage> }
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] pub struct ProductImage { pub url: String, pub alt: Option<String>, pub position: u32 }
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)] pub struct SeoData { pub title: String, pub description: String, pub url: String }

/// Catalogue specification sheet. Empty strings mean "not specified".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub material: String,
    pub model_number: String,
    pub packing: String,
    pub moq: String,
    pub package: String,
    pub single_package_size: String,
    pub single_gross_weight: String,
    pub recommended_age: String,
    pub gender: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { Active, #[default] Draft, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::Draft => "draft", Self::Archived => "archived" }
    }
}

/// Creation input for a catalogue product.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ProductDraft {
    pub id: Option<String>,
    #[validate(custom = "not_blank")]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    pub sku: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[serde(default)]
    pub inventory: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ProductStatus,
}

impl Product {
    pub fn create(draft: ProductDraft, id: String, currency: &str, now: DateTime<Utc>) -> Result<Self> {
        let mut errors = draft.validate().err().map(FieldErrors::from).unwrap_or_default();
        let sku = Sku::new(draft.sku).map_err(|e| errors.push("sku", e.to_string())).ok();
        errors.into_result()?;
        let sku = sku.ok_or_else(|| ConsoleError::field("sku", "SKU empty"))?;
        let mut tags: Vec<String> = Vec::with_capacity(draft.tags.len());
        for tag in draft.tags.into_iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            if !tags.contains(&tag) { tags.push(tag); }
        }
        let mut product = Self {
            id: id.clone(), title: draft.title.trim().to_string(), category: draft.category, sub_category: draft.sub_category,
            sku, description: draft.description, specification: Specification::default(), tags,
            price: Money::new(draft.price, currency), compare_at_price: None, mrp: None, cost: None,
            inventory: Quantity::new(draft.inventory), images: vec![], variants: vec![],
            seo: SeoData::default(), status: draft.status, created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id }));
        Ok(product)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn category(&self) -> &str { &self.category }
    pub fn sub_category(&self) -> &str { &self.sub_category }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn description(&self) -> &str { &self.description }
    pub fn specification(&self) -> &Specification { &self.specification }
    pub fn tags(&self) -> &[String] { &self.tags }
    pub fn price(&self) -> &Money { &self.price }
    pub fn compare_at_price(&self) -> Option<&Money> { self.compare_at_price.as_ref() }
    pub fn mrp(&self) -> Option<&Money> { self.mrp.as_ref() }
    pub fn cost(&self) -> Option<&Money> { self.cost.as_ref() }
    pub fn inventory(&self) -> Quantity { self.inventory }
    pub fn images(&self) -> &[ProductImage] { &self.images }
    pub fn variants(&self) -> &[Variant] { &self.variants }
    pub fn seo(&self) -> &SeoData { &self.seo }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn is_in_stock(&self) -> bool { !self.inventory.is_zero() }

    /// Record-level rules for data that did not come through [`Product::create`].
    pub fn violations(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.title.trim().is_empty() { errors.push("title", "must not be blank"); }
        let currency = self.price.currency();
        let amounts = [("price", Some(&self.price)), ("compare_at_price", self.compare_at_price.as_ref()), ("mrp", self.mrp.as_ref()), ("cost", self.cost.as_ref())];
        for (field, amount) in amounts {
            let Some(amount) = amount else { continue };
            if amount.is_negative() { errors.push(field, "must not be negative"); }
            if amount.currency() != currency { errors.push(field, "currency differs from price"); }
        }
        errors
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    pub(crate) fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}
