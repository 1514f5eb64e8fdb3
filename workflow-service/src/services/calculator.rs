//! Monetary calculator: pure, stateless totals computation.
//!
//! All money math uses `Decimal`; per-item totals are rounded half-up to
//! two decimals at the point of computation and then summed, so repeated
//! runs over the same inputs are byte-identical.

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::models::{DeliveryItem, DeliveryItemDraft, LineItem, LineItemDraft};

/// Computed monetary breakdown for a document.
#[derive(Debug, Clone)]
pub struct Totals {
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub vat: Option<Decimal>,
    pub total: Decimal,
}

/// Round half-up to two decimal places.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `round2(quantity * unit_price * (1 - discount/100))`.
pub fn line_total(quantity: Decimal, unit_price: Decimal, discount_percent: Decimal) -> Decimal {
    let factor = Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED;
    round2(quantity * unit_price * factor)
}

/// Compute line items and document totals from drafts.
///
/// An empty draft list yields zero totals; rejecting empty documents is
/// the lifecycle service's job.
pub fn calculate(
    drafts: &[LineItemDraft],
    tax_rate: Decimal,
    vat_rate: Option<Decimal>,
) -> Totals {
    let items: Vec<LineItem> = drafts
        .iter()
        .map(|draft| LineItem {
            line_item_id: Uuid::new_v4(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            discount_percent: draft.discount_percent,
            unit: draft.unit.clone(),
            tax_rate_override: draft.tax_rate_override,
            total: line_total(draft.quantity, draft.unit_price, draft.discount_percent),
        })
        .collect();

    let subtotal: Decimal = items.iter().map(|item| item.total).sum();
    let tax = round2(subtotal * tax_rate / Decimal::ONE_HUNDRED);
    let vat = vat_rate.map(|rate| round2(subtotal * rate / Decimal::ONE_HUNDRED));
    let total = subtotal + tax + vat.unwrap_or(Decimal::ZERO);

    Totals {
        items,
        subtotal,
        tax,
        vat,
        total,
    }
}

/// Delivery notes never carry discounts or tax: items keep quantity,
/// unit, and unit price only, and the note total is `round2(Σ qty × price)`.
pub fn calculate_delivery(drafts: &[DeliveryItemDraft]) -> (Vec<DeliveryItem>, Decimal) {
    let items: Vec<DeliveryItem> = drafts
        .iter()
        .map(|draft| DeliveryItem {
            delivery_item_id: Uuid::new_v4(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            quantity: draft.quantity,
            unit: draft.unit.clone(),
            unit_price: draft.unit_price,
        })
        .collect();

    let subtotal: Decimal = items
        .iter()
        .map(|item| round2(item.quantity * item.unit_price))
        .sum();

    (items, subtotal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn line_total_applies_discount_and_rounds_half_up() {
        // 3 * 9.99 * 0.85 = 25.47450 -> 25.47
        assert_eq!(
            line_total(dec("3"), dec("9.99"), dec("15")),
            dec("25.47")
        );
        // 1 * 10.005 -> 10.01 (half rounds up)
        assert_eq!(line_total(dec("1"), dec("10.005"), Decimal::ZERO), dec("10.01"));
    }

    #[test]
    fn totals_invariant_holds() {
        let drafts = vec![
            LineItemDraft::new("Widget", dec("2"), dec("10")),
            LineItemDraft::new("Gadget", dec("1"), dec("49.99")).with_discount(dec("10")),
        ];
        let totals = calculate(&drafts, dec("19"), None);

        assert_eq!(totals.subtotal, dec("64.99")); // 20.00 + 44.99
        assert_eq!(totals.tax, dec("12.35")); // round2(64.99 * 0.19) = 12.3481
        assert_eq!(totals.total, totals.subtotal + totals.tax);
    }

    #[test]
    fn vat_is_independent_of_tax() {
        let drafts = vec![LineItemDraft::new("Service", dec("1"), dec("100"))];
        let totals = calculate(&drafts, dec("10"), Some(dec("5")));

        assert_eq!(totals.tax, dec("10.00"));
        assert_eq!(totals.vat, Some(dec("5.00")));
        assert_eq!(totals.total, dec("115.00"));
    }

    #[test]
    fn empty_items_yield_zero_totals() {
        let totals = calculate(&[], dec("19"), None);
        assert!(totals.items.is_empty());
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn calculation_is_deterministic() {
        let drafts = vec![
            LineItemDraft::new("A", dec("7"), dec("3.33")).with_discount(dec("12.5")),
            LineItemDraft::new("B", dec("0.5"), dec("199.95")),
        ];
        let first = calculate(&drafts, dec("7.7"), Some(dec("2.1")));
        let second = calculate(&drafts, dec("7.7"), Some(dec("2.1")));

        assert_eq!(first.subtotal, second.subtotal);
        assert_eq!(first.tax, second.tax);
        assert_eq!(first.vat, second.vat);
        assert_eq!(first.total, second.total);
    }

    #[test]
    fn delivery_totals_ignore_discount_and_tax() {
        let drafts = vec![DeliveryItemDraft {
            name: "Crate".into(),
            description: None,
            quantity: dec("4"),
            unit: "pcs".into(),
            unit_price: dec("2.50"),
        }];
        let (items, subtotal) = calculate_delivery(&drafts);
        assert_eq!(items.len(), 1);
        assert_eq!(subtotal, dec("10.00"));
    }
}
