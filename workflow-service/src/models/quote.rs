//! Quote model for workflow-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::line_item::{LineItem, LineItemDraft};

/// Quote status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
        }
    }

    /// Legal transitions. `accepted`/`rejected`/`expired` are terminal for
    /// normal flow; administrative overrides live outside the engine.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        use QuoteStatus::*;
        matches!(
            (self, next),
            (Draft, Sent | Accepted | Rejected | Expired) | (Sent, Accepted | Rejected | Expired)
        )
    }

    /// Statuses a quote may be created in.
    pub fn is_allowed_initial(&self) -> bool {
        matches!(self, QuoteStatus::Draft | QuoteStatus::Sent)
    }
}

/// Quote document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: Uuid,
    pub tenant_id: Uuid,
    pub quote_number: String,
    pub company_id: Uuid,
    pub contact_id: Option<Uuid>,
    /// The tenant's own selling entity.
    pub seller_company_id: Uuid,
    pub status: QuoteStatus,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub created_by: Uuid,
    pub items: Vec<LineItem>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a quote.
#[derive(Debug, Clone)]
pub struct CreateQuote {
    pub contact_id: Option<Uuid>,
    pub seller_company_id: Uuid,
    pub status: Option<QuoteStatus>,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub items: Vec<LineItemDraft>,
}

/// Input for updating a quote. `None` keeps the existing value; an `items`
/// replacement or a `tax_rate` change triggers a totals recomputation.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuote {
    pub contact_id: Option<Uuid>,
    pub issue_date: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub items: Option<Vec<LineItemDraft>>,
}

/// Filter parameters for listing quotes.
#[derive(Debug, Clone, Default)]
pub struct ListQuotesFilter {
    pub status: Option<QuoteStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_exits() {
        for terminal in [
            QuoteStatus::Accepted,
            QuoteStatus::Rejected,
            QuoteStatus::Expired,
        ] {
            for next in [
                QuoteStatus::Draft,
                QuoteStatus::Sent,
                QuoteStatus::Accepted,
                QuoteStatus::Rejected,
                QuoteStatus::Expired,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn draft_reaches_all_four_targets() {
        assert!(QuoteStatus::Draft.can_transition_to(QuoteStatus::Sent));
        assert!(QuoteStatus::Draft.can_transition_to(QuoteStatus::Accepted));
        assert!(QuoteStatus::Draft.can_transition_to(QuoteStatus::Rejected));
        assert!(QuoteStatus::Draft.can_transition_to(QuoteStatus::Expired));
        assert!(!QuoteStatus::Sent.can_transition_to(QuoteStatus::Draft));
    }
}
