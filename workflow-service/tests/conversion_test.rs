//! Conversion engine tests: carry-forward, partial invoicing, delivery
//! derivation, provenance edges, and tenant-level access.

mod common;

use common::{dec, item, setup};
use rust_decimal::Decimal;
use service_core::error::EngineError;
use uuid::Uuid;
use workflow_service::models::{DeliveryStatus, Identity, InvoiceStatus, Role};
use workflow_service::services::conversion::{
    DeliveryNoteCustomization, InvoiceCustomization, OrderCustomization,
    OrderInvoiceCustomization, PartialInvoice,
};

#[tokio::test]
async fn quote_to_order_carries_totals_forward() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let quote = ctx
        .lifecycle
        .create_quote(&fixture.scope, &fixture.identity, common::quote_input(&fixture))
        .await
        .unwrap();
    assert_eq!(quote.subtotal, dec("20.00"));

    let order = ctx
        .conversion
        .quote_to_order(&fixture.identity, quote.quote_id, OrderCustomization::default())
        .await
        .unwrap();

    assert_eq!(order.subtotal, quote.subtotal);
    assert_eq!(order.tax, quote.tax);
    assert_eq!(order.total, quote.total);
    assert_eq!(order.source_quote_id, Some(quote.quote_id));
    assert_eq!(order.company_id, quote.company_id);
    assert_eq!(order.order_number, "ORD-000001");
    assert_eq!(order.status, "open");
    assert_eq!(order.items.len(), quote.items.len());
    // Same values, fresh item identities.
    assert_ne!(order.items[0].line_item_id, quote.items[0].line_item_id);
    assert_eq!(order.items[0].total, quote.items[0].total);
}

#[tokio::test]
async fn quote_to_invoice_stamps_backreference_and_snapshots() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let quote = ctx
        .lifecycle
        .create_quote(&fixture.scope, &fixture.identity, common::quote_input(&fixture))
        .await
        .unwrap();

    let invoice = ctx
        .conversion
        .quote_to_invoice(
            &fixture.identity,
            quote.quote_id,
            InvoiceCustomization::default(),
        )
        .await
        .unwrap();

    assert_eq!(invoice.quote_id, Some(quote.quote_id));
    assert_eq!(invoice.order_id, None);
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.subtotal, quote.subtotal);
    assert_eq!(invoice.total, quote.total);
    assert_eq!(invoice.paid_amount, Decimal::ZERO);
    assert_eq!(invoice.customer.name, fixture.customer.name);
    assert_eq!(invoice.seller.name, fixture.seller.name);
    assert_eq!(invoice.currency, "USD");
}

#[tokio::test]
async fn source_document_with_edge_cannot_be_deleted() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let quote = ctx
        .lifecycle
        .create_quote(&fixture.scope, &fixture.identity, common::quote_input(&fixture))
        .await
        .unwrap();
    ctx.conversion
        .quote_to_order(&fixture.identity, quote.quote_id, OrderCustomization::default())
        .await
        .unwrap();

    let err = ctx
        .lifecycle
        .delete_quote(&fixture.scope, quote.quote_id)
        .await
        .unwrap_err();
    match err {
        EngineError::HasDependents(counts) => {
            assert!(counts.iter().any(|c| c.record_type == "order" && c.count == 1));
        }
        other => panic!("expected HasDependents, got {other:?}"),
    }
}

#[tokio::test]
async fn order_to_invoice_partial_percentage_scales_totals() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    // One item, 1 × 100, no tax: total 100.00.
    let order = ctx
        .lifecycle
        .create_order(&fixture.scope, &fixture.identity, common::order_input(&fixture))
        .await
        .unwrap();
    assert_eq!(order.total, dec("100.00"));

    let invoice = ctx
        .conversion
        .order_to_invoice(
            &fixture.identity,
            order.order_id,
            OrderInvoiceCustomization {
                partial: Some(PartialInvoice::Percentage(dec("50"))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(invoice.total, dec("50.00"));
    assert_eq!(invoice.order_id, Some(order.order_id));
    assert_eq!(invoice.items[0].quantity, dec("0.5"));
}

#[tokio::test]
async fn order_to_invoice_partial_amount_scales_uniformly() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let order = ctx
        .lifecycle
        .create_order(&fixture.scope, &fixture.identity, common::order_input(&fixture))
        .await
        .unwrap();

    let invoice = ctx
        .conversion
        .order_to_invoice(
            &fixture.identity,
            order.order_id,
            OrderInvoiceCustomization {
                partial: Some(PartialInvoice::Amount(dec("25"))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(invoice.total, dec("25.00"));
}

#[tokio::test]
async fn partial_values_out_of_range_are_rejected() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let order = ctx
        .lifecycle
        .create_order(&fixture.scope, &fixture.identity, common::order_input(&fixture))
        .await
        .unwrap();

    for partial in [
        PartialInvoice::Percentage(Decimal::ZERO),
        PartialInvoice::Percentage(dec("150")),
        PartialInvoice::Amount(Decimal::ZERO),
        PartialInvoice::Amount(dec("100.01")),
    ] {
        let err = ctx
            .conversion
            .order_to_invoice(
                &fixture.identity,
                order.order_id,
                OrderInvoiceCustomization {
                    partial: Some(partial),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}

#[tokio::test]
async fn full_order_to_invoice_carries_totals_verbatim() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let order = ctx
        .lifecycle
        .create_order(&fixture.scope, &fixture.identity, common::order_input(&fixture))
        .await
        .unwrap();

    let invoice = ctx
        .conversion
        .order_to_invoice(
            &fixture.identity,
            order.order_id,
            OrderInvoiceCustomization::default(),
        )
        .await
        .unwrap();

    assert_eq!(invoice.subtotal, order.subtotal);
    assert_eq!(invoice.tax, order.tax);
    assert_eq!(invoice.total, order.total);
}

#[tokio::test]
async fn order_to_delivery_note_drops_discounts_and_tax() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let mut input = common::order_input(&fixture);
    input.items = vec![item("Widget", "2", "10").with_discount(dec("50"))];
    input.tax_rate = dec("19");
    let order = ctx
        .lifecycle
        .create_order(&fixture.scope, &fixture.identity, input)
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec("10.00"));

    let note = ctx
        .conversion
        .order_to_delivery_note(
            &fixture.identity,
            order.order_id,
            DeliveryNoteCustomization::default(),
        )
        .await
        .unwrap();

    assert_eq!(note.status, DeliveryStatus::Pending);
    assert_eq!(note.order_id, Some(order.order_id));
    assert_eq!(note.tax, Decimal::ZERO);
    // Full quantity at full price: the discount does not carry over.
    assert_eq!(note.subtotal, dec("20.00"));
    assert_eq!(note.total, note.subtotal);
}

#[tokio::test]
async fn invoice_to_delivery_note_links_the_invoice() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let invoice = ctx
        .lifecycle
        .create_invoice(
            &fixture.scope,
            &fixture.identity,
            common::invoice_input(&fixture, InvoiceStatus::Sent),
        )
        .await
        .unwrap();

    let note = ctx
        .conversion
        .invoice_to_delivery_note(
            &fixture.identity,
            invoice.invoice_id,
            DeliveryNoteCustomization {
                carrier: Some("DHL".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(note.invoice_id, Some(invoice.invoice_id));
    assert_eq!(note.carrier.as_deref(), Some("DHL"));
    assert_eq!(note.items.len(), invoice.items.len());
}

#[tokio::test]
async fn custom_number_override_is_used_verbatim() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let quote = ctx
        .lifecycle
        .create_quote(&fixture.scope, &fixture.identity, common::quote_input(&fixture))
        .await
        .unwrap();

    let order = ctx
        .conversion
        .quote_to_order(
            &fixture.identity,
            quote.quote_id,
            OrderCustomization {
                number: Some("ORD-CUSTOM-7".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(order.order_number, "ORD-CUSTOM-7");

    // A duplicate override is a conflict, not silently renumbered.
    let err = ctx
        .conversion
        .quote_to_order(
            &fixture.identity,
            quote.quote_id,
            OrderCustomization {
                number: Some("ORD-CUSTOM-7".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));
}

#[tokio::test]
async fn conversion_requires_a_tenant() {
    let ctx = setup();
    let fixture = ctx.seed_tenant().await;

    let quote = ctx
        .lifecycle
        .create_quote(&fixture.scope, &fixture.identity, common::quote_input(&fixture))
        .await
        .unwrap();

    let tenantless = Identity {
        user_id: fixture.identity.user_id,
        role: Role::User,
        tenant_id: None,
        active_tenant_id: None,
    };
    let err = ctx
        .conversion
        .quote_to_order(&tenantless, quote.quote_id, OrderCustomization::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnauthorizedTenant(_)));
}

#[tokio::test]
async fn conversion_cannot_see_other_tenants_documents() {
    let ctx = setup();
    let fixture_a = ctx.seed_tenant().await;
    let fixture_b = ctx.seed_tenant().await;

    let quote = ctx
        .lifecycle
        .create_quote(
            &fixture_a.scope,
            &fixture_a.identity,
            common::quote_input(&fixture_a),
        )
        .await
        .unwrap();

    let err = ctx
        .conversion
        .quote_to_order(
            &fixture_b.identity,
            quote.quote_id,
            OrderCustomization::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Unknown ids resolve the same way.
    let err = ctx
        .conversion
        .quote_to_order(
            &fixture_a.identity,
            Uuid::new_v4(),
            OrderCustomization::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
