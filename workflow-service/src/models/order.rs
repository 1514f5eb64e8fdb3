//! Order model for workflow-service.
//!
//! Orders carry no enforced status machine; they are pass-through carriers
//! between quotes and invoices/delivery notes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::line_item::{LineItem, LineItemDraft};

pub const ORDER_STATUS_OPEN: &str = "open";

/// Order document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub tenant_id: Uuid,
    pub order_number: String,
    pub company_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub seller_company_id: Uuid,
    /// Back-reference to the quote this order was converted from.
    pub source_quote_id: Option<Uuid>,
    /// Free-form status, defaulting to `open`.
    pub status: String,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub purchase_order_number: Option<String>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub items: Vec<LineItem>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating an order directly (not via conversion).
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub contact_id: Option<Uuid>,
    pub seller_company_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_delivery_date: Option<NaiveDate>,
    pub purchase_order_number: Option<String>,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub items: Vec<LineItemDraft>,
}

/// Input for updating an order.
#[derive(Debug, Clone, Default)]
pub struct UpdateOrder {
    pub contact_id: Option<Uuid>,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub purchase_order_number: Option<String>,
    pub status: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Option<Vec<LineItemDraft>>,
}

/// Filter parameters for listing orders.
#[derive(Debug, Clone, Default)]
pub struct ListOrdersFilter {
    pub source_quote_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
