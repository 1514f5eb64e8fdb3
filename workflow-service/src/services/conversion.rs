//! Workflow conversion engine.
//!
//! Converts one document type into another, deriving the target's fields
//! from the source, stamping back-references, and recording the
//! provenance edge in the same transaction as the target row.
//!
//! Quote conversions carry totals forward verbatim (same commercial
//! terms, different document); order-to-invoice may scale for partial
//! invoicing, which re-runs the calculator on the scaled quantities.

use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::EngineError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    ChainEdge, DeliveryItemDraft, DeliveryNote, DeliveryStatus, DocumentType, Identity, Invoice,
    InvoiceStatus, LineItem, Order, order::ORDER_STATUS_OPEN,
};
use crate::services::lifecycle::LifecycleService;
use crate::services::numbering;
use crate::store::ConvertedDocument;

const DEFAULT_CURRENCY: &str = "USD";

/// Overrides applied when converting a quote into an order.
#[derive(Debug, Clone, Default)]
pub struct OrderCustomization {
    pub number: Option<String>,
    pub order_date: Option<chrono::NaiveDate>,
    pub expected_delivery_date: Option<chrono::NaiveDate>,
    pub purchase_order_number: Option<String>,
    pub notes: Option<String>,
}

/// Overrides applied when converting into an invoice.
#[derive(Debug, Clone, Default)]
pub struct InvoiceCustomization {
    pub number: Option<String>,
    pub issue_date: Option<chrono::NaiveDate>,
    pub due_date: Option<chrono::NaiveDate>,
    pub currency: Option<String>,
    pub vat_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Order-to-invoice overrides; the only conversion that supports partial
/// invoicing.
#[derive(Debug, Clone, Default)]
pub struct OrderInvoiceCustomization {
    pub invoice: InvoiceCustomization,
    pub partial: Option<PartialInvoice>,
}

/// Partial invoicing request: a percentage of the order, or a fixed
/// amount scaled proportionally across every line item.
#[derive(Debug, Clone)]
pub enum PartialInvoice {
    Percentage(Decimal),
    Amount(Decimal),
}

impl PartialInvoice {
    /// The uniform quantity scale factor, validated against the source
    /// order's total. Percentage must lie in (0, 100], amount in
    /// (0, order total].
    fn scale_factor(&self, order_total: Decimal) -> Result<Decimal, EngineError> {
        match self {
            PartialInvoice::Percentage(pct) => {
                if *pct <= Decimal::ZERO || *pct > Decimal::ONE_HUNDRED {
                    return Err(EngineError::validation(
                        "partial percentage must be in (0, 100]",
                    ));
                }
                Ok(pct / Decimal::ONE_HUNDRED)
            }
            PartialInvoice::Amount(amount) => {
                if *amount <= Decimal::ZERO || *amount > order_total {
                    return Err(EngineError::validation(
                        "partial amount must be positive and not exceed the order total",
                    ));
                }
                Ok(amount / order_total)
            }
        }
    }
}

/// Overrides applied when converting into a delivery note.
#[derive(Debug, Clone, Default)]
pub struct DeliveryNoteCustomization {
    pub number: Option<String>,
    pub ship_date: Option<chrono::NaiveDate>,
    pub shipping_address: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

/// Copy line items onto a new document. Values carry over verbatim; ids
/// are re-minted because they are scoped to one document's lifetime.
fn copy_items(items: &[LineItem]) -> Vec<LineItem> {
    items
        .iter()
        .map(|item| LineItem {
            line_item_id: Uuid::new_v4(),
            ..item.clone()
        })
        .collect()
}

fn delivery_drafts(items: &[LineItem]) -> Vec<DeliveryItemDraft> {
    items
        .iter()
        .map(|item| DeliveryItemDraft {
            name: item.name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            unit_price: item.unit_price,
        })
        .collect()
}

pub struct ConversionService {
    lifecycle: Arc<LifecycleService>,
}

impl ConversionService {
    pub fn new(lifecycle: Arc<LifecycleService>) -> Self {
        Self { lifecycle }
    }

    /// Conversions are a tenant-level privilege: the seller side of a
    /// converted document is always the tenant's own selling company.
    fn require_tenant(&self, identity: &Identity) -> Result<Uuid, EngineError> {
        identity.tenant().ok_or_else(|| {
            EngineError::UnauthorizedTenant(anyhow::anyhow!("caller has no tenant context"))
        })
    }

    /// Persist a conversion target plus its edge. A caller-supplied
    /// number skips the generator and is not retried; a generated number
    /// runs under the bounded collision retry.
    async fn commit<B>(
        &self,
        tenant_id: Uuid,
        doc_type: DocumentType,
        operation: &str,
        number_override: Option<String>,
        build: B,
    ) -> Result<ConvertedDocument, EngineError>
    where
        B: Fn(String) -> (ConvertedDocument, ChainEdge),
    {
        let store = self.lifecycle.store();
        let document = match number_override {
            Some(number) => {
                let (document, edge) = build(number);
                store.insert_converted(&document, &edge).await?;
                document
            }
            None => {
                self.lifecycle
                    .with_number_retry(doc_type, operation, |_| {
                        let build = &build;
                        async move {
                            let number =
                                numbering::next_number(store.as_ref(), tenant_id, doc_type)
                                    .await?;
                            let (document, edge) = build(number);
                            store.insert_converted(&document, &edge).await?;
                            Ok(document)
                        }
                    })
                    .await?
            }
        };

        self.lifecycle
            .invalidate_lists(tenant_id, document.doc_type())
            .await;
        Ok(document)
    }

    /// Convert a quote into an order, carrying totals forward verbatim.
    #[instrument(skip(self, identity, customizations), fields(quote_id = %quote_id))]
    pub async fn quote_to_order(
        &self,
        identity: &Identity,
        quote_id: Uuid,
        customizations: OrderCustomization,
    ) -> Result<Order, EngineError> {
        let tenant_id = self.require_tenant(identity)?;
        let quote = self
            .lifecycle
            .store()
            .get_quote(tenant_id, quote_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Quote not found"))?;

        let document = self
            .commit(
                tenant_id,
                DocumentType::Order,
                "quote_to_order",
                customizations.number.clone(),
                |number| {
                    let now = Utc::now();
                    let order = Order {
                        order_id: Uuid::new_v4(),
                        tenant_id,
                        order_number: number,
                        company_id: quote.company_id,
                        contact_id: quote.contact_id,
                        seller_company_id: quote.seller_company_id,
                        source_quote_id: Some(quote.quote_id),
                        status: ORDER_STATUS_OPEN.to_string(),
                        order_date: customizations.order_date.unwrap_or(quote.issue_date),
                        expected_delivery_date: customizations.expected_delivery_date,
                        purchase_order_number: customizations.purchase_order_number.clone(),
                        subtotal: quote.subtotal,
                        tax_rate: quote.tax_rate,
                        tax: quote.tax,
                        total: quote.total,
                        notes: customizations.notes.clone().or_else(|| quote.notes.clone()),
                        created_by: identity.user_id,
                        items: copy_items(&quote.items),
                        created_utc: now,
                        updated_utc: now,
                    };
                    let edge = ChainEdge::new(
                        tenant_id,
                        DocumentType::Quote,
                        quote.quote_id,
                        DocumentType::Order,
                        order.order_id,
                    );
                    (ConvertedDocument::Order(order), edge)
                },
            )
            .await?;

        let ConvertedDocument::Order(order) = document else {
            unreachable!("quote_to_order builds an order");
        };
        info!(order_id = %order.order_id, order_number = %order.order_number, "Quote converted to order");
        Ok(order)
    }

    /// Convert a quote directly into an invoice, carrying totals forward
    /// and stamping frozen company snapshots.
    #[instrument(skip(self, identity, customizations), fields(quote_id = %quote_id))]
    pub async fn quote_to_invoice(
        &self,
        identity: &Identity,
        quote_id: Uuid,
        customizations: InvoiceCustomization,
    ) -> Result<Invoice, EngineError> {
        let tenant_id = self.require_tenant(identity)?;
        let quote = self
            .lifecycle
            .store()
            .get_quote(tenant_id, quote_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Quote not found"))?;
        let (customer, seller) = self
            .load_snapshots(quote.company_id, quote.seller_company_id)
            .await?;

        let vat_rate = customizations.vat_rate;
        if let Some(rate) = vat_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(EngineError::validation("vat rate must be between 0 and 100"));
            }
        }
        let vat = vat_rate.map(|rate| {
            crate::services::calculator::round2(quote.subtotal * rate / Decimal::ONE_HUNDRED)
        });

        let document = self
            .commit(
                tenant_id,
                DocumentType::Invoice,
                "quote_to_invoice",
                customizations.number.clone(),
                |number| {
                    let now = Utc::now();
                    let invoice = Invoice {
                        invoice_id: Uuid::new_v4(),
                        tenant_id,
                        invoice_number: number,
                        company_id: quote.company_id,
                        contact_id: quote.contact_id,
                        seller_company_id: quote.seller_company_id,
                        quote_id: Some(quote.quote_id),
                        order_id: None,
                        status: InvoiceStatus::Draft,
                        issue_date: customizations
                            .issue_date
                            .unwrap_or_else(|| Utc::now().date_naive()),
                        due_date: customizations.due_date,
                        subtotal: quote.subtotal,
                        tax_rate: quote.tax_rate,
                        tax: quote.tax,
                        vat_rate,
                        vat,
                        total: quote.total + vat.unwrap_or(Decimal::ZERO),
                        paid_amount: Decimal::ZERO,
                        customer: (&customer).into(),
                        seller: (&seller).into(),
                        currency: customizations
                            .currency
                            .clone()
                            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                        notes: customizations.notes.clone().or_else(|| quote.notes.clone()),
                        created_by: identity.user_id,
                        items: copy_items(&quote.items),
                        created_utc: now,
                        updated_utc: now,
                    };
                    let edge = ChainEdge::new(
                        tenant_id,
                        DocumentType::Quote,
                        quote.quote_id,
                        DocumentType::Invoice,
                        invoice.invoice_id,
                    );
                    (ConvertedDocument::Invoice(invoice), edge)
                },
            )
            .await?;

        let ConvertedDocument::Invoice(invoice) = document else {
            unreachable!("quote_to_invoice builds an invoice");
        };
        info!(invoice_id = %invoice.invoice_id, invoice_number = %invoice.invoice_number, "Quote converted to invoice");
        Ok(invoice)
    }

    /// Convert an order into an invoice, optionally for a partial value.
    ///
    /// Without `partial`, totals carry forward verbatim. With it, every
    /// line item's quantity is scaled by the uniform factor and the
    /// calculator re-runs on the scaled drafts.
    #[instrument(skip(self, identity, customizations), fields(order_id = %order_id))]
    pub async fn order_to_invoice(
        &self,
        identity: &Identity,
        order_id: Uuid,
        customizations: OrderInvoiceCustomization,
    ) -> Result<Invoice, EngineError> {
        let tenant_id = self.require_tenant(identity)?;
        let order = self
            .lifecycle
            .store()
            .get_order(tenant_id, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order not found"))?;
        let (customer, seller) = self
            .load_snapshots(order.company_id, order.seller_company_id)
            .await?;

        let vat_rate = customizations.invoice.vat_rate;
        if let Some(rate) = vat_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(EngineError::validation("vat rate must be between 0 and 100"));
            }
        }

        // Either scaled-and-recomputed or carried forward verbatim.
        let (items, subtotal, tax, vat, total) = match &customizations.partial {
            Some(partial) => {
                let factor = partial.scale_factor(order.total)?;
                let drafts: Vec<_> = order
                    .items
                    .iter()
                    .map(|item| {
                        let mut draft = item.to_draft();
                        draft.quantity = item.quantity * factor;
                        draft
                    })
                    .collect();
                let totals =
                    crate::services::calculator::calculate(&drafts, order.tax_rate, vat_rate);
                (
                    totals.items,
                    totals.subtotal,
                    totals.tax,
                    totals.vat,
                    totals.total,
                )
            }
            None => {
                let vat = vat_rate.map(|rate| {
                    crate::services::calculator::round2(
                        order.subtotal * rate / Decimal::ONE_HUNDRED,
                    )
                });
                (
                    copy_items(&order.items),
                    order.subtotal,
                    order.tax,
                    vat,
                    order.total + vat.unwrap_or(Decimal::ZERO),
                )
            }
        };

        let document = self
            .commit(
                tenant_id,
                DocumentType::Invoice,
                "order_to_invoice",
                customizations.invoice.number.clone(),
                |number| {
                    let now = Utc::now();
                    let invoice = Invoice {
                        invoice_id: Uuid::new_v4(),
                        tenant_id,
                        invoice_number: number,
                        company_id: order.company_id,
                        contact_id: order.contact_id,
                        seller_company_id: order.seller_company_id,
                        quote_id: order.source_quote_id,
                        order_id: Some(order.order_id),
                        status: InvoiceStatus::Draft,
                        issue_date: customizations
                            .invoice
                            .issue_date
                            .unwrap_or_else(|| Utc::now().date_naive()),
                        due_date: customizations.invoice.due_date,
                        subtotal,
                        tax_rate: order.tax_rate,
                        tax,
                        vat_rate,
                        vat,
                        total,
                        paid_amount: Decimal::ZERO,
                        customer: (&customer).into(),
                        seller: (&seller).into(),
                        currency: customizations
                            .invoice
                            .currency
                            .clone()
                            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                        notes: customizations
                            .invoice
                            .notes
                            .clone()
                            .or_else(|| order.notes.clone()),
                        created_by: identity.user_id,
                        items: copy_items(&items),
                        created_utc: now,
                        updated_utc: now,
                    };
                    let edge = ChainEdge::new(
                        tenant_id,
                        DocumentType::Order,
                        order.order_id,
                        DocumentType::Invoice,
                        invoice.invoice_id,
                    );
                    (ConvertedDocument::Invoice(invoice), edge)
                },
            )
            .await?;

        let ConvertedDocument::Invoice(invoice) = document else {
            unreachable!("order_to_invoice builds an invoice");
        };
        info!(invoice_id = %invoice.invoice_id, invoice_number = %invoice.invoice_number, "Order converted to invoice");
        Ok(invoice)
    }

    /// Convert an order into a pending delivery note. Only the
    /// delivery-relevant item fields carry over; discounts and tax do not.
    #[instrument(skip(self, identity, customizations), fields(order_id = %order_id))]
    pub async fn order_to_delivery_note(
        &self,
        identity: &Identity,
        order_id: Uuid,
        customizations: DeliveryNoteCustomization,
    ) -> Result<DeliveryNote, EngineError> {
        let tenant_id = self.require_tenant(identity)?;
        let order = self
            .lifecycle
            .store()
            .get_order(tenant_id, order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order not found"))?;

        self.convert_to_delivery_note(
            identity,
            tenant_id,
            "order_to_delivery_note",
            DocumentType::Order,
            order.order_id,
            order.company_id,
            order.seller_company_id,
            None,
            Some(order.order_id),
            &order.items,
            customizations,
        )
        .await
    }

    /// Convert an invoice into a pending delivery note.
    #[instrument(skip(self, identity, customizations), fields(invoice_id = %invoice_id))]
    pub async fn invoice_to_delivery_note(
        &self,
        identity: &Identity,
        invoice_id: Uuid,
        customizations: DeliveryNoteCustomization,
    ) -> Result<DeliveryNote, EngineError> {
        let tenant_id = self.require_tenant(identity)?;
        let invoice = self
            .lifecycle
            .store()
            .get_invoice(tenant_id, invoice_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Invoice not found"))?;

        self.convert_to_delivery_note(
            identity,
            tenant_id,
            "invoice_to_delivery_note",
            DocumentType::Invoice,
            invoice.invoice_id,
            invoice.company_id,
            invoice.seller_company_id,
            Some(invoice.invoice_id),
            invoice.order_id,
            &invoice.items,
            customizations,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn convert_to_delivery_note(
        &self,
        identity: &Identity,
        tenant_id: Uuid,
        operation: &str,
        from_type: DocumentType,
        from_id: Uuid,
        company_id: Uuid,
        seller_company_id: Uuid,
        invoice_id: Option<Uuid>,
        order_id: Option<Uuid>,
        source_items: &[LineItem],
        customizations: DeliveryNoteCustomization,
    ) -> Result<DeliveryNote, EngineError> {
        let drafts = delivery_drafts(source_items);
        let (items, subtotal) = crate::services::calculator::calculate_delivery(&drafts);

        let document = self
            .commit(
                tenant_id,
                DocumentType::DeliveryNote,
                operation,
                customizations.number.clone(),
                |number| {
                    let now = Utc::now();
                    let note = DeliveryNote {
                        delivery_note_id: Uuid::new_v4(),
                        tenant_id,
                        delivery_number: number,
                        company_id,
                        seller_company_id,
                        invoice_id,
                        order_id,
                        status: DeliveryStatus::Pending,
                        ship_date: customizations.ship_date,
                        delivery_date: None,
                        shipping_address: customizations.shipping_address.clone(),
                        carrier: customizations.carrier.clone(),
                        tracking_number: customizations.tracking_number.clone(),
                        subtotal,
                        tax: Decimal::ZERO,
                        total: subtotal,
                        created_by: identity.user_id,
                        items: items
                            .iter()
                            .map(|item| crate::models::DeliveryItem {
                                delivery_item_id: Uuid::new_v4(),
                                ..item.clone()
                            })
                            .collect(),
                        created_utc: now,
                        updated_utc: now,
                    };
                    let edge = ChainEdge::new(
                        tenant_id,
                        from_type,
                        from_id,
                        DocumentType::DeliveryNote,
                        note.delivery_note_id,
                    );
                    (ConvertedDocument::DeliveryNote(note), edge)
                },
            )
            .await?;

        let ConvertedDocument::DeliveryNote(note) = document else {
            unreachable!("delivery conversions build a delivery note");
        };
        info!(delivery_note_id = %note.delivery_note_id, delivery_number = %note.delivery_number, "Converted to delivery note");
        Ok(note)
    }

    async fn load_snapshots(
        &self,
        company_id: Uuid,
        seller_company_id: Uuid,
    ) -> Result<(crate::models::Company, crate::models::Company), EngineError> {
        let store = self.lifecycle.store();
        let customer = store
            .get_company(company_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Customer company not found"))?;
        let seller = store
            .get_company(seller_company_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Seller company not found"))?;
        Ok((customer, seller))
    }
}
