//! Value Objects for the operations console

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty, TooLong }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "SKU empty"), Self::TooLong => write!(f, "SKU too long") }
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_negative(&self) -> bool { self.amount.is_sign_negative() && !self.amount.is_zero() }

    /// Same currency, different amount.
    pub fn with_amount(&self, amount: Decimal) -> Money { Money::new(amount, &self.currency) }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        self.amount.checked_add(other.amount).map(|a| self.with_amount(a)).ok_or(MoneyError::Overflow)
    }
    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        self.amount.checked_sub(other.amount).map(|a| self.with_amount(a)).ok_or(MoneyError::Overflow)
    }
    pub fn multiply(&self, qty: u32) -> Result<Money, MoneyError> {
        self.amount.checked_mul(Decimal::from(qty)).map(|a| self.with_amount(a)).ok_or(MoneyError::Overflow)
    }
}

impl Default for Money { fn default() -> Self { Self::zero("USD") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch, Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::CurrencyMismatch => write!(f, "Currency mismatch"), Self::Overflow => write!(f, "Amount out of range") }
    }
}

/// Quantity value object, never negative
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn is_zero(&self) -> bool { self.0 == 0 }

    /// `None` when the count falls outside `0..=u32::MAX`.
    pub fn from_signed(value: i64) -> Option<Self> { u32::try_from(value).ok().map(Self) }
}

/// Customer contact block shared by RFQs and orders
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub company: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// One audit-trail entry: the status a record entered and when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    pub status: S,
    pub at: DateTime<Utc>,
}

impl<S> StatusChange<S> {
    pub fn new(status: S, at: DateTime<Utc>) -> Self { Self { status, at } }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new(" prod-001 ").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }
    #[test]
    fn test_sku_rejects_blank() { assert_eq!(Sku::new("   "), Err(SkuError::Empty)); }
    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "USD");
        let b = Money::new(Decimal::new(50, 0), "USD");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert_eq!(a.subtract(&b).unwrap().amount(), Decimal::new(50, 0));
        assert_eq!(a.add(&Money::zero("EUR")), Err(MoneyError::CurrencyMismatch));
    }
    #[test]
    fn test_money_overflow_is_an_error() {
        let max = Money::new(Decimal::MAX, "USD");
        assert_eq!(max.add(&Money::new(Decimal::ONE, "USD")), Err(MoneyError::Overflow));
        assert_eq!(max.multiply(2), Err(MoneyError::Overflow));
        assert_eq!(Money::new(Decimal::MIN, "USD").subtract(&max), Err(MoneyError::Overflow));
        assert!(Money::new(Decimal::new(-1, 0), "USD").is_negative());
    }
    #[test]
    fn test_quantity_from_signed() {
        assert_eq!(Quantity::from_signed(7), Some(Quantity::new(7)));
        assert_eq!(Quantity::from_signed(-1), None);
    }
}
