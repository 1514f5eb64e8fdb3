//! Delivery note model for workflow-service.
//!
//! Delivery items never carry discounts or tax; the note's totals are
//! always recomputed as `round2(Σ quantity × unit_price)`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery note status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InTransit,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
        }
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Pending, InTransit) | (InTransit, Delivered)
        )
    }
}

/// Item on a delivery note: quantity, unit, and unit price only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryItem {
    pub delivery_item_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
}

/// Input for a delivery item.
#[derive(Debug, Clone)]
pub struct DeliveryItemDraft {
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
}

/// Delivery note document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryNote {
    pub delivery_note_id: Uuid,
    pub tenant_id: Uuid,
    pub delivery_number: String,
    pub company_id: Uuid,
    pub seller_company_id: Uuid,
    /// Back-reference when converted from an invoice.
    pub invoice_id: Option<Uuid>,
    /// Back-reference when converted from an order.
    pub order_id: Option<Uuid>,
    pub status: DeliveryStatus,
    pub ship_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub shipping_address: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub created_by: Uuid,
    pub items: Vec<DeliveryItem>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a delivery note directly (not via conversion).
#[derive(Debug, Clone)]
pub struct CreateDeliveryNote {
    pub seller_company_id: Uuid,
    pub ship_date: Option<NaiveDate>,
    pub shipping_address: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub items: Vec<DeliveryItemDraft>,
}

/// Input for updating a delivery note.
#[derive(Debug, Clone, Default)]
pub struct UpdateDeliveryNote {
    pub ship_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub shipping_address: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub items: Option<Vec<DeliveryItemDraft>>,
}

/// Filter parameters for listing delivery notes.
#[derive(Debug, Clone, Default)]
pub struct ListDeliveryNotesFilter {
    pub status: Option<DeliveryStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_flow_is_strictly_forward() {
        assert!(DeliveryStatus::Pending.can_transition_to(DeliveryStatus::InTransit));
        assert!(DeliveryStatus::InTransit.can_transition_to(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Pending.can_transition_to(DeliveryStatus::Delivered));
        assert!(!DeliveryStatus::Delivered.can_transition_to(DeliveryStatus::Pending));
    }
}
