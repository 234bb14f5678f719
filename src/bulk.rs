//! Bulk mutation calculator.
//!
//! An intent is sparse: `None`, blank strings, empty collections and the
//! `none` adjustment all mean "leave this field alone". Every mergeable field
//! is listed explicitly in [`apply_product`]; nothing is spread wholesale.
//!
//! Decreases are floor-clamped at zero without reporting an error. Any other
//! adjustment that lands below zero makes the record invalid.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::aggregates::{Product, ProductImage, ProductStatus, Ticket, TicketCategory, TicketPriority};
use crate::domain::events::{DomainEvent, Evented, ProductEvent};
use crate::domain::value_objects::{Money, Quantity, Sku};
use crate::store::Entity;
use crate::{ConsoleError, FieldErrors, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind { #[default] None, Increase, Decrease, Set }

/// A relative or absolute change to a numeric field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub value: Decimal,
    /// Ignored for `set`.
    pub is_percentage: bool,
}

impl Adjustment {
    pub fn increase(value: Decimal) -> Self { Self { kind: AdjustmentKind::Increase, value, is_percentage: false } }
    pub fn increase_percent(value: Decimal) -> Self { Self { kind: AdjustmentKind::Increase, value, is_percentage: true } }
    pub fn decrease(value: Decimal) -> Self { Self { kind: AdjustmentKind::Decrease, value, is_percentage: false } }
    pub fn decrease_percent(value: Decimal) -> Self { Self { kind: AdjustmentKind::Decrease, value, is_percentage: true } }
    pub fn set(value: Decimal) -> Self { Self { kind: AdjustmentKind::Set, value, is_percentage: false } }

    pub fn is_none(&self) -> bool { self.kind == AdjustmentKind::None }

    /// `None` when the result does not fit a `Decimal`.
    pub fn resolve(&self, base: Decimal) -> Option<Decimal> {
        let delta = if self.is_percentage {
            base.checked_mul(self.value)?.checked_div(Decimal::ONE_HUNDRED)?
        } else {
            self.value
        };
        match self.kind {
            AdjustmentKind::None => Some(base),
            AdjustmentKind::Increase => base.checked_add(delta),
            AdjustmentKind::Decrease => base.checked_sub(delta).map(|v| v.max(Decimal::ZERO)),
            AdjustmentKind::Set => Some(self.value),
        }
    }

    /// Integer variant for stock counts; fractional results round half away
    /// from zero. `None` if the result does not fit an `i64`.
    pub fn resolve_count(&self, base: u32) -> Option<i64> {
        self.resolve(Decimal::from(base))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpecificationPatch {
    pub material: Option<String>,
    pub model_number: Option<String>,
    pub packing: Option<String>,
    pub moq: Option<String>,
    pub package: Option<String>,
    pub single_package_size: Option<String>,
    pub single_gross_weight: Option<String>,
    pub recommended_age: Option<String>,
    pub gender: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SeoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

/// Sparse edit applied to every selected product.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProductIntent {
    pub title: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProductStatus>,
    pub specification: SpecificationPatch,
    pub seo: SeoPatch,
    pub tags_to_add: Vec<String>,
    pub tags_to_remove: Vec<String>,
    pub price: Adjustment,
    pub inventory: Adjustment,
    pub compare_at_price: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub cost: Option<Decimal>,
    /// Replaces the whole image list when non-empty.
    pub images: Vec<ProductImage>,
    /// Variant index → replacement images.
    pub variant_images: BTreeMap<usize, Vec<ProductImage>>,
}

/// Sparse triage edit applied to every selected ticket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TicketIntent {
    pub priority: Option<TicketPriority>,
    pub category: Option<TicketCategory>,
}

/// A record type the bulk-action coordinator can edit.
pub trait BulkEditable: Entity + Evented {
    type Intent;

    /// Builds the edited copy; `self` is never touched.
    fn apply_intent(&self, intent: &Self::Intent, now: DateTime<Utc>) -> Result<Self>;
}

impl BulkEditable for Product {
    type Intent = ProductIntent;

    fn apply_intent(&self, intent: &ProductIntent, now: DateTime<Utc>) -> Result<Self> {
        apply_product(self, intent, now)
    }
}

impl BulkEditable for Ticket {
    type Intent = TicketIntent;

    fn apply_intent(&self, intent: &TicketIntent, now: DateTime<Utc>) -> Result<Self> {
        let mut ticket = self.clone();
        ticket.retriage(intent.priority, intent.category, now);
        Ok(ticket)
    }
}

fn overwrite(target: &mut String, value: &Option<String>) {
    if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        *target = v.to_string();
    }
}

/// `(base ∪ add) − remove`. A tag in both `add` and `remove` is removed.
/// Order is base order, then new tags in the order they were added.
pub fn reconcile_tags(base: &[String], add: &[String], remove: &[String]) -> Vec<String> {
    let removed: HashSet<&str> = remove.iter().map(|t| t.trim()).collect();
    let mut out: Vec<String> = Vec::with_capacity(base.len() + add.len());
    for tag in base.iter().chain(add).map(|t| t.trim()) {
        if tag.is_empty() || removed.contains(tag) || out.iter().any(|t| t == tag) { continue; }
        out.push(tag.to_string());
    }
    out
}

fn overwrite_amount(target: &mut Option<Money>, value: Option<Decimal>, currency: &Money, field: &str, errors: &mut FieldErrors) {
    if let Some(amount) = value {
        if amount < Decimal::ZERO {
            errors.push(field, "must not be negative");
        } else {
            *target = Some(currency.with_amount(amount));
        }
    }
}

pub fn apply_product(base: &Product, intent: &ProductIntent, now: DateTime<Utc>) -> Result<Product> {
    let mut p = base.clone();
    let mut errors = FieldErrors::new();

    overwrite(&mut p.title, &intent.title);
    overwrite(&mut p.category, &intent.category);
    overwrite(&mut p.sub_category, &intent.sub_category);
    overwrite(&mut p.description, &intent.description);
    if let Some(sku) = intent.sku.as_deref().filter(|s| !s.trim().is_empty()) {
        match Sku::new(sku) {
            Ok(sku) => p.sku = sku,
            Err(e) => errors.push("sku", e.to_string()),
        }
    }
    if let Some(status) = intent.status { p.status = status; }

    let spec = &intent.specification;
    overwrite(&mut p.specification.material, &spec.material);
    overwrite(&mut p.specification.model_number, &spec.model_number);
    overwrite(&mut p.specification.packing, &spec.packing);
    overwrite(&mut p.specification.moq, &spec.moq);
    overwrite(&mut p.specification.package, &spec.package);
    overwrite(&mut p.specification.single_package_size, &spec.single_package_size);
    overwrite(&mut p.specification.single_gross_weight, &spec.single_gross_weight);
    overwrite(&mut p.specification.recommended_age, &spec.recommended_age);
    overwrite(&mut p.specification.gender, &spec.gender);

    overwrite(&mut p.seo.title, &intent.seo.title);
    overwrite(&mut p.seo.description, &intent.seo.description);
    overwrite(&mut p.seo.url, &intent.seo.url);

    p.tags = reconcile_tags(&base.tags, &intent.tags_to_add, &intent.tags_to_remove);

    if !intent.price.is_none() {
        match intent.price.resolve(base.price.amount()) {
            Some(price) if price < Decimal::ZERO => errors.push("price", "adjusted price must not be negative"),
            Some(price) => p.price = base.price.with_amount(price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)),
            None => errors.push("price", "adjusted price is out of range"),
        }
    }

    if !intent.inventory.is_none() {
        match intent.inventory.resolve_count(base.inventory.value()).and_then(Quantity::from_signed) {
            Some(count) => p.inventory = count,
            None => errors.push("inventory", "adjusted inventory must be a whole number between 0 and 4294967295"),
        }
    }

    overwrite_amount(&mut p.compare_at_price, intent.compare_at_price, &base.price, "compare_at_price", &mut errors);
    overwrite_amount(&mut p.mrp, intent.mrp, &base.price, "mrp", &mut errors);
    overwrite_amount(&mut p.cost, intent.cost, &base.price, "cost", &mut errors);

    if !intent.images.is_empty() {
        p.images = intent.images.clone();
    }
    for (index, images) in &intent.variant_images {
        if images.is_empty() { continue; }
        if let Some(variant) = p.variants.get_mut(*index) {
            variant.images = images.clone();
        }
    }

    if !errors.is_empty() {
        return Err(ConsoleError::Validation(errors));
    }
    p.updated_at = now;
    p.raise_event(DomainEvent::Product(ProductEvent::BulkEdited { product_id: p.id.clone() }));
    Ok(p)
}
