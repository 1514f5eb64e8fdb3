//! Line item model for workflow-service.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Line item on a quote, order, or invoice. Owned exclusively by its
/// parent document and replaced as a set on update; the id is stable only
/// within one document's lifetime (UI diffing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Percentage in 0..=100.
    pub discount_percent: Decimal,
    pub unit: String,
    pub tax_rate_override: Option<Decimal>,
    /// `round2(quantity * unit_price * (1 - discount/100))`, computed by
    /// the calculator.
    pub total: Decimal,
}

impl LineItem {
    /// Re-derive the input shape, used when an update recomputes totals
    /// from the persisted items.
    pub fn to_draft(&self) -> LineItemDraft {
        LineItemDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount_percent: self.discount_percent,
            unit: self.unit.clone(),
            tax_rate_override: self.tax_rate_override,
        }
    }
}

/// Input for a line item, before totals are computed.
#[derive(Debug, Clone)]
pub struct LineItemDraft {
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub unit: String,
    pub tax_rate_override: Option<Decimal>,
}

impl LineItemDraft {
    pub fn new(name: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            name: name.into(),
            description: None,
            quantity,
            unit_price,
            discount_percent: Decimal::ZERO,
            unit: "pcs".to_string(),
            tax_rate_override: None,
        }
    }

    pub fn with_discount(mut self, discount_percent: Decimal) -> Self {
        self.discount_percent = discount_percent;
        self
    }
}
