//! Console configuration, read from the process environment.

use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_TAX_RATE: &str = "0.08";
const DEFAULT_TICKET_PREFIX: &str = "TKT";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Currency stamped on new RFQs, orders and products.
    pub currency: String,
    /// Fraction applied to an order's discounted subtotal.
    pub tax_rate: Decimal,
    pub ticket_prefix: String,
    pub rfq_prefix: String,
    pub order_prefix: String,
    /// Optional JSON snapshot loaded at startup.
    pub seed_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            tax_rate: default_tax_rate(),
            ticket_prefix: DEFAULT_TICKET_PREFIX.to_string(),
            rfq_prefix: "RFQ".to_string(),
            order_prefix: "ORD".to_string(),
            seed_path: None,
        }
    }
}

fn default_tax_rate() -> Decimal {
    Decimal::from_str(DEFAULT_TAX_RATE).unwrap_or(Decimal::ZERO)
}

impl ConsoleConfig {
    /// Reads `BIZOPS_*` variables; call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(currency) = lookup("BIZOPS_CURRENCY").filter(|v| !v.trim().is_empty()) {
            config.currency = currency.trim().to_uppercase();
        }
        if let Some(raw) = lookup("BIZOPS_TAX_RATE") {
            match Decimal::from_str(raw.trim()) {
                Ok(rate) if rate >= Decimal::ZERO => config.tax_rate = rate,
                _ => warn!(value = %raw, "ignoring invalid BIZOPS_TAX_RATE, using {}", DEFAULT_TAX_RATE),
            }
        }
        if let Some(prefix) = lookup("BIZOPS_TICKET_PREFIX").filter(|v| !v.trim().is_empty()) {
            config.ticket_prefix = prefix.trim().to_string();
        }
        config.seed_path = lookup("BIZOPS_SEED").filter(|v| !v.trim().is_empty()).map(PathBuf::from);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::from_lookup(|_| None);
        assert_eq!(config.currency, "USD");
        assert_eq!(config.tax_rate, dec!(0.08));
        assert_eq!(config.ticket_prefix, "TKT");
        assert!(config.seed_path.is_none());
    }

    #[test]
    fn test_overrides_and_bad_rate() {
        let vars: HashMap<&str, &str> = [("BIZOPS_CURRENCY", "ngn"), ("BIZOPS_TAX_RATE", "abc"), ("BIZOPS_SEED", "seed.json")].into();
        let config = ConsoleConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.currency, "NGN");
        assert_eq!(config.tax_rate, dec!(0.08));
        assert_eq!(config.seed_path, Some(PathBuf::from("seed.json")));
    }
}
