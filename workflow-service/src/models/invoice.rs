//! Invoice model for workflow-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::company::CompanySnapshot;
use super::line_item::{LineItem, LineItemDraft};

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Legal transitions. Payment recording may additionally move
    /// `sent`/`overdue` to `paid` as a side effect of `paid_amount`
    /// reaching the total.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent) | (Sent, Paid | Overdue | Cancelled) | (Overdue, Paid | Cancelled)
        )
    }

    /// Statuses an invoice may be created in.
    pub fn is_allowed_initial(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Sent)
    }
}

/// Invoice document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_number: String,
    pub company_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub seller_company_id: Uuid,
    /// Back-reference when converted directly from a quote.
    pub quote_id: Option<Uuid>,
    /// Back-reference when converted from an order.
    pub order_id: Option<Uuid>,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub vat_rate: Option<Decimal>,
    pub vat: Option<Decimal>,
    pub total: Decimal,
    /// Monotonically non-decreasing; only grows through payment recording.
    pub paid_amount: Decimal,
    /// Frozen copies of company details at issue time.
    pub customer: CompanySnapshot,
    pub seller: CompanySnapshot,
    pub currency: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub items: Vec<LineItem>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating an invoice directly (not via conversion).
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub contact_id: Option<Uuid>,
    pub seller_company_id: Uuid,
    pub status: Option<InvoiceStatus>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub vat_rate: Option<Decimal>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<LineItemDraft>,
}

/// Input for updating an invoice.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub contact_id: Option<Uuid>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub vat_rate: Option<Decimal>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<LineItemDraft>>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
