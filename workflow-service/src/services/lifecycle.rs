//! Document lifecycle service.
//!
//! Owns per-type create/update/delete, status transitions, and payment
//! recording. Every operation takes a resolved [`Scope`] and filters all
//! reads and writes on it. Creation wraps the number-generator insert in
//! a bounded retry so concurrent writers never commit duplicate numbers.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use service_core::cache::{Cache, del_best_effort, invalidate_best_effort, set_best_effort};
use service_core::error::{ConflictKind, EngineError};
use service_core::retry::retry_on_conflict;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::EngineSettings;
use crate::models::{
    Company, CreateCompany, CreateDeliveryNote, CreateInvoice, CreateOrder, CreateQuote,
    DeliveryItemDraft, DeliveryNote, DeliveryStatus, DocumentType, Identity, Invoice,
    InvoiceStatus, LineItemDraft, ListDeliveryNotesFilter, ListInvoicesFilter, ListOrdersFilter,
    ListQuotesFilter, Order, Quote, QuoteStatus, Scope, UpdateDeliveryNote, UpdateInvoice,
    UpdateOrder, UpdateQuote, order::ORDER_STATUS_OPEN,
};
use crate::services::{cache_keys, calculator, numbering};
use crate::store::DocumentStore;

const DEFAULT_CURRENCY: &str = "USD";

pub struct LifecycleService {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn Cache>,
    settings: EngineSettings,
}

fn validate_rate(field: &str, rate: Decimal) -> Result<(), EngineError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(EngineError::validation(format!(
            "{field} must be between 0 and 100"
        )));
    }
    Ok(())
}

fn validate_items(drafts: &[LineItemDraft]) -> Result<(), EngineError> {
    if drafts.is_empty() {
        return Err(EngineError::validation("document requires at least one line item"));
    }
    for draft in drafts {
        if draft.name.trim().is_empty() {
            return Err(EngineError::validation("line item name must not be empty"));
        }
        if draft.quantity <= Decimal::ZERO {
            return Err(EngineError::validation("line item quantity must be positive"));
        }
        if draft.unit_price < Decimal::ZERO {
            return Err(EngineError::validation("line item unit price must not be negative"));
        }
        validate_rate("line item discount", draft.discount_percent)?;
    }
    Ok(())
}

fn validate_delivery_items(drafts: &[DeliveryItemDraft]) -> Result<(), EngineError> {
    if drafts.is_empty() {
        return Err(EngineError::validation("document requires at least one line item"));
    }
    for draft in drafts {
        if draft.name.trim().is_empty() {
            return Err(EngineError::validation("delivery item name must not be empty"));
        }
        if draft.quantity <= Decimal::ZERO {
            return Err(EngineError::validation("delivery item quantity must be positive"));
        }
        if draft.unit_price < Decimal::ZERO {
            return Err(EngineError::validation(
                "delivery item unit price must not be negative",
            ));
        }
    }
    Ok(())
}

impl LifecycleService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<dyn Cache>, settings: EngineSettings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Run a numbered insert under the bounded collision retry; budget
    /// exhaustion surfaces as `NumberGenerationExhausted`, never as a
    /// silent duplicate.
    pub(crate) async fn with_number_retry<T, F, Fut>(
        &self,
        doc_type: DocumentType,
        operation: &str,
        f: F,
    ) -> Result<T, EngineError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let retry = self.settings.retry();
        let result = retry_on_conflict(
            &retry,
            operation,
            |e| e.is_conflict(ConflictKind::DocumentNumber),
            f,
        )
        .await;

        match result {
            Err(e) if e.is_conflict(ConflictKind::DocumentNumber) => {
                error!(
                    document_type = doc_type.as_str(),
                    attempts = retry.max_attempts,
                    "Document number generation exhausted"
                );
                Err(EngineError::NumberGenerationExhausted {
                    document_type: doc_type.as_str().to_string(),
                    attempts: retry.max_attempts,
                })
            }
            other => other,
        }
    }

    /// Read-through single-document fetch: serve the cached copy when
    /// present, otherwise hit the store and cache the result for
    /// `cache_ttl_seconds`. An unreadable cached value counts as a miss.
    async fn read_through<T, F, Fut>(
        &self,
        tenant_id: Uuid,
        doc_type: DocumentType,
        id: Uuid,
        fetch: F,
    ) -> Result<Option<T>, EngineError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, EngineError>>,
    {
        let key = cache_keys::document_key(tenant_id, doc_type, id);
        if let Ok(Some(raw)) = self.cache.get(&key).await {
            if let Ok(document) = serde_json::from_str(&raw) {
                return Ok(Some(document));
            }
        }

        let fetched = fetch().await?;
        if let Some(document) = &fetched {
            if let Ok(raw) = serde_json::to_string(document) {
                set_best_effort(
                    self.cache.as_ref(),
                    &key,
                    &raw,
                    self.settings.cache_ttl_seconds,
                )
                .await;
            }
        }
        Ok(fetched)
    }

    pub(crate) async fn invalidate_document(
        &self,
        tenant_id: Uuid,
        doc_type: DocumentType,
        id: Uuid,
    ) {
        del_best_effort(
            self.cache.as_ref(),
            &cache_keys::document_key(tenant_id, doc_type, id),
        )
        .await;
        invalidate_best_effort(
            self.cache.as_ref(),
            &cache_keys::list_pattern(tenant_id, doc_type),
        )
        .await;
    }

    pub(crate) async fn invalidate_lists(&self, tenant_id: Uuid, doc_type: DocumentType) {
        invalidate_best_effort(
            self.cache.as_ref(),
            &cache_keys::list_pattern(tenant_id, doc_type),
        )
        .await;
    }

    /// Verify the seller company exists and belongs to the tenant. The
    /// seller side of every document is the tenant's own entity.
    async fn verify_seller(
        &self,
        tenant_id: Uuid,
        seller_company_id: Uuid,
    ) -> Result<Company, EngineError> {
        let company = self
            .store
            .get_company(seller_company_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Seller company not found"))?;
        if company.tenant_id != tenant_id {
            return Err(EngineError::ScopeMismatch(anyhow::anyhow!(
                "seller company {} does not belong to the caller's tenant",
                seller_company_id
            )));
        }
        Ok(company)
    }

    // -------------------------------------------------------------------------
    // Company Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, identity, input), fields(user_id = %identity.user_id))]
    pub async fn create_company(
        &self,
        identity: &Identity,
        input: CreateCompany,
    ) -> Result<Company, EngineError> {
        let tenant_id = identity.tenant().ok_or_else(|| {
            EngineError::UnauthorizedTenant(anyhow::anyhow!("caller has no tenant context"))
        })?;
        if input.name.trim().is_empty() {
            return Err(EngineError::validation("company name must not be empty"));
        }

        let company = Company {
            company_id: Uuid::new_v4(),
            tenant_id,
            name: input.name,
            email: input.email,
            address: input.address,
            tax_id: input.tax_id,
            created_utc: Utc::now(),
        };
        self.store.insert_company(&company).await?;
        self.store
            .add_company_member(company.company_id, identity.user_id)
            .await?;

        info!(company_id = %company.company_id, "Company created");
        Ok(company)
    }

    /// Delete a company, rejected while any document still references it.
    #[instrument(skip(self, identity), fields(company_id = %company_id))]
    pub async fn delete_company(
        &self,
        identity: &Identity,
        company_id: Uuid,
    ) -> Result<(), EngineError> {
        let tenant_id = identity.tenant().ok_or_else(|| {
            EngineError::UnauthorizedTenant(anyhow::anyhow!("caller has no tenant context"))
        })?;
        let company = self
            .store
            .get_company(company_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Company not found"))?;
        if company.tenant_id != tenant_id {
            return Err(EngineError::ScopeMismatch(anyhow::anyhow!(
                "company {} does not belong to the caller's tenant",
                company_id
            )));
        }

        let dependents = self
            .store
            .count_company_documents(tenant_id, company_id)
            .await?;
        if !dependents.is_empty() {
            return Err(EngineError::HasDependents(dependents));
        }

        self.store.delete_company(tenant_id, company_id).await?;
        info!(company_id = %company_id, "Company deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Quote Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, identity, input), fields(tenant_id = %scope.tenant_id(), company_id = %scope.company_id()))]
    pub async fn create_quote(
        &self,
        scope: &Scope,
        identity: &Identity,
        input: CreateQuote,
    ) -> Result<Quote, EngineError> {
        validate_items(&input.items)?;
        validate_rate("tax rate", input.tax_rate)?;
        let status = input.status.unwrap_or(QuoteStatus::Draft);
        if !status.is_allowed_initial() {
            return Err(EngineError::validation(format!(
                "quote cannot be created in status {}",
                status.as_str()
            )));
        }
        self.verify_seller(scope.tenant_id(), input.seller_company_id)
            .await?;

        let totals = calculator::calculate(&input.items, input.tax_rate, None);
        let quote = self
            .with_number_retry(DocumentType::Quote, "create_quote", |_| {
                let totals = &totals;
                let input = &input;
                async move {
                    let number = numbering::next_number(
                        self.store.as_ref(),
                        scope.tenant_id(),
                        DocumentType::Quote,
                    )
                    .await?;
                    let now = Utc::now();
                    let quote = Quote {
                        quote_id: Uuid::new_v4(),
                        tenant_id: scope.tenant_id(),
                        quote_number: number,
                        company_id: scope.company_id(),
                        contact_id: input.contact_id,
                        seller_company_id: input.seller_company_id,
                        status,
                        issue_date: input.issue_date,
                        valid_until: input.valid_until,
                        subtotal: totals.subtotal,
                        tax_rate: input.tax_rate,
                        tax: totals.tax,
                        total: totals.total,
                        notes: input.notes.clone(),
                        terms: input.terms.clone(),
                        created_by: identity.user_id,
                        items: totals.items.clone(),
                        created_utc: now,
                        updated_utc: now,
                    };
                    self.store.insert_quote(&quote).await?;
                    Ok(quote)
                }
            })
            .await?;

        self.invalidate_lists(scope.tenant_id(), DocumentType::Quote)
            .await;
        info!(quote_id = %quote.quote_id, quote_number = %quote.quote_number, "Quote created");
        Ok(quote)
    }

    pub async fn get_quote(&self, scope: &Scope, quote_id: Uuid) -> Result<Quote, EngineError> {
        self.read_through(scope.tenant_id(), DocumentType::Quote, quote_id, || {
            async move { self.store.get_quote(scope.tenant_id(), quote_id).await }
        })
        .await?
        .filter(|q: &Quote| q.company_id == scope.company_id())
        .ok_or_else(|| EngineError::not_found("Quote not found"))
    }

    pub async fn list_quotes(
        &self,
        scope: &Scope,
        filter: &ListQuotesFilter,
    ) -> Result<Vec<Quote>, EngineError> {
        self.store
            .list_quotes(scope.tenant_id(), Some(scope.company_id()), filter)
            .await
    }

    #[instrument(skip(self, patch), fields(quote_id = %quote_id))]
    pub async fn update_quote(
        &self,
        scope: &Scope,
        quote_id: Uuid,
        patch: UpdateQuote,
    ) -> Result<Quote, EngineError> {
        let mut quote = self.get_quote(scope, quote_id).await?;

        if let Some(contact_id) = patch.contact_id {
            quote.contact_id = Some(contact_id);
        }
        if let Some(issue_date) = patch.issue_date {
            quote.issue_date = issue_date;
        }
        if let Some(valid_until) = patch.valid_until {
            quote.valid_until = Some(valid_until);
        }
        if let Some(notes) = patch.notes {
            quote.notes = Some(notes);
        }
        if let Some(terms) = patch.terms {
            quote.terms = Some(terms);
        }
        let rate_changed = patch.tax_rate.is_some();
        if let Some(tax_rate) = patch.tax_rate {
            validate_rate("tax rate", tax_rate)?;
            quote.tax_rate = tax_rate;
        }

        if patch.items.is_some() || rate_changed {
            let drafts = match patch.items {
                Some(items) => {
                    validate_items(&items)?;
                    items
                }
                None => quote.items.iter().map(|i| i.to_draft()).collect(),
            };
            let totals = calculator::calculate(&drafts, quote.tax_rate, None);
            quote.items = totals.items;
            quote.subtotal = totals.subtotal;
            quote.tax = totals.tax;
            quote.total = totals.total;
        }

        quote.updated_utc = Utc::now();
        if !self.store.update_quote(&quote).await? {
            return Err(EngineError::not_found("Quote not found"));
        }

        self.invalidate_document(scope.tenant_id(), DocumentType::Quote, quote_id)
            .await;
        Ok(quote)
    }

    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn delete_quote(&self, scope: &Scope, quote_id: Uuid) -> Result<(), EngineError> {
        self.get_quote(scope, quote_id).await?;

        let dependents = self
            .store
            .count_dependents(scope.tenant_id(), DocumentType::Quote, quote_id)
            .await?;
        if !dependents.is_empty() {
            return Err(EngineError::HasDependents(dependents));
        }

        self.store.delete_quote(scope.tenant_id(), quote_id).await?;
        self.invalidate_document(scope.tenant_id(), DocumentType::Quote, quote_id)
            .await;
        info!(quote_id = %quote_id, "Quote deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn update_quote_status(
        &self,
        scope: &Scope,
        quote_id: Uuid,
        new_status: QuoteStatus,
    ) -> Result<Quote, EngineError> {
        let mut quote = self.get_quote(scope, quote_id).await?;
        if !quote.status.can_transition_to(new_status) {
            return Err(EngineError::validation(format!(
                "illegal quote status transition {} -> {}",
                quote.status.as_str(),
                new_status.as_str()
            )));
        }
        quote.status = new_status;
        quote.updated_utc = Utc::now();
        if !self.store.update_quote(&quote).await? {
            return Err(EngineError::not_found("Quote not found"));
        }
        self.invalidate_document(scope.tenant_id(), DocumentType::Quote, quote_id)
            .await;
        Ok(quote)
    }

    // -------------------------------------------------------------------------
    // Order Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, identity, input), fields(tenant_id = %scope.tenant_id(), company_id = %scope.company_id()))]
    pub async fn create_order(
        &self,
        scope: &Scope,
        identity: &Identity,
        input: CreateOrder,
    ) -> Result<Order, EngineError> {
        validate_items(&input.items)?;
        validate_rate("tax rate", input.tax_rate)?;
        self.verify_seller(scope.tenant_id(), input.seller_company_id)
            .await?;

        let totals = calculator::calculate(&input.items, input.tax_rate, None);
        let order = self
            .with_number_retry(DocumentType::Order, "create_order", |_| {
                let totals = &totals;
                let input = &input;
                async move {
                    let number = numbering::next_number(
                        self.store.as_ref(),
                        scope.tenant_id(),
                        DocumentType::Order,
                    )
                    .await?;
                    let now = Utc::now();
                    let order = Order {
                        order_id: Uuid::new_v4(),
                        tenant_id: scope.tenant_id(),
                        order_number: number,
                        company_id: scope.company_id(),
                        contact_id: input.contact_id,
                        seller_company_id: input.seller_company_id,
                        source_quote_id: None,
                        status: ORDER_STATUS_OPEN.to_string(),
                        order_date: input.order_date,
                        expected_delivery_date: input.expected_delivery_date,
                        purchase_order_number: input.purchase_order_number.clone(),
                        subtotal: totals.subtotal,
                        tax_rate: input.tax_rate,
                        tax: totals.tax,
                        total: totals.total,
                        notes: input.notes.clone(),
                        created_by: identity.user_id,
                        items: totals.items.clone(),
                        created_utc: now,
                        updated_utc: now,
                    };
                    self.store.insert_order(&order).await?;
                    Ok(order)
                }
            })
            .await?;

        self.invalidate_lists(scope.tenant_id(), DocumentType::Order)
            .await;
        info!(order_id = %order.order_id, order_number = %order.order_number, "Order created");
        Ok(order)
    }

    pub async fn get_order(&self, scope: &Scope, order_id: Uuid) -> Result<Order, EngineError> {
        self.read_through(scope.tenant_id(), DocumentType::Order, order_id, || {
            async move { self.store.get_order(scope.tenant_id(), order_id).await }
        })
        .await?
        .filter(|o: &Order| o.company_id == scope.company_id())
        .ok_or_else(|| EngineError::not_found("Order not found"))
    }

    pub async fn list_orders(
        &self,
        scope: &Scope,
        filter: &ListOrdersFilter,
    ) -> Result<Vec<Order>, EngineError> {
        self.store
            .list_orders(scope.tenant_id(), Some(scope.company_id()), filter)
            .await
    }

    #[instrument(skip(self, patch), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        scope: &Scope,
        order_id: Uuid,
        patch: UpdateOrder,
    ) -> Result<Order, EngineError> {
        let mut order = self.get_order(scope, order_id).await?;

        if let Some(contact_id) = patch.contact_id {
            order.contact_id = Some(contact_id);
        }
        if let Some(order_date) = patch.order_date {
            order.order_date = order_date;
        }
        if let Some(expected) = patch.expected_delivery_date {
            order.expected_delivery_date = Some(expected);
        }
        if let Some(po) = patch.purchase_order_number {
            order.purchase_order_number = Some(po);
        }
        if let Some(status) = patch.status {
            order.status = status;
        }
        if let Some(notes) = patch.notes {
            order.notes = Some(notes);
        }
        let rate_changed = patch.tax_rate.is_some();
        if let Some(tax_rate) = patch.tax_rate {
            validate_rate("tax rate", tax_rate)?;
            order.tax_rate = tax_rate;
        }

        if patch.items.is_some() || rate_changed {
            let drafts = match patch.items {
                Some(items) => {
                    validate_items(&items)?;
                    items
                }
                None => order.items.iter().map(|i| i.to_draft()).collect(),
            };
            let totals = calculator::calculate(&drafts, order.tax_rate, None);
            order.items = totals.items;
            order.subtotal = totals.subtotal;
            order.tax = totals.tax;
            order.total = totals.total;
        }

        order.updated_utc = Utc::now();
        if !self.store.update_order(&order).await? {
            return Err(EngineError::not_found("Order not found"));
        }

        self.invalidate_document(scope.tenant_id(), DocumentType::Order, order_id)
            .await;
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, scope: &Scope, order_id: Uuid) -> Result<(), EngineError> {
        self.get_order(scope, order_id).await?;

        let dependents = self
            .store
            .count_dependents(scope.tenant_id(), DocumentType::Order, order_id)
            .await?;
        if !dependents.is_empty() {
            return Err(EngineError::HasDependents(dependents));
        }

        self.store.delete_order(scope.tenant_id(), order_id).await?;
        self.invalidate_document(scope.tenant_id(), DocumentType::Order, order_id)
            .await;
        info!(order_id = %order_id, "Order deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, identity, input), fields(tenant_id = %scope.tenant_id(), company_id = %scope.company_id()))]
    pub async fn create_invoice(
        &self,
        scope: &Scope,
        identity: &Identity,
        input: CreateInvoice,
    ) -> Result<Invoice, EngineError> {
        validate_items(&input.items)?;
        validate_rate("tax rate", input.tax_rate)?;
        if let Some(vat_rate) = input.vat_rate {
            validate_rate("vat rate", vat_rate)?;
        }
        let status = input.status.unwrap_or(InvoiceStatus::Draft);
        if !status.is_allowed_initial() {
            return Err(EngineError::validation(format!(
                "invoice cannot be created in status {}",
                status.as_str()
            )));
        }

        let customer = self
            .store
            .get_company(scope.company_id())
            .await?
            .ok_or_else(|| EngineError::not_found("Customer company not found"))?;
        let seller = self
            .verify_seller(scope.tenant_id(), input.seller_company_id)
            .await?;

        let totals = calculator::calculate(&input.items, input.tax_rate, input.vat_rate);
        let invoice = self
            .with_number_retry(DocumentType::Invoice, "create_invoice", |_| {
                let totals = &totals;
                let input = &input;
                let customer = &customer;
                let seller = &seller;
                async move {
                    let number = numbering::next_number(
                        self.store.as_ref(),
                        scope.tenant_id(),
                        DocumentType::Invoice,
                    )
                    .await?;
                    let now = Utc::now();
                    let invoice = Invoice {
                        invoice_id: Uuid::new_v4(),
                        tenant_id: scope.tenant_id(),
                        invoice_number: number,
                        company_id: scope.company_id(),
                        contact_id: input.contact_id,
                        seller_company_id: input.seller_company_id,
                        quote_id: None,
                        order_id: None,
                        status,
                        issue_date: input.issue_date,
                        due_date: input.due_date,
                        subtotal: totals.subtotal,
                        tax_rate: input.tax_rate,
                        tax: totals.tax,
                        vat_rate: input.vat_rate,
                        vat: totals.vat,
                        total: totals.total,
                        paid_amount: Decimal::ZERO,
                        customer: customer.into(),
                        seller: seller.into(),
                        currency: input
                            .currency
                            .clone()
                            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                        notes: input.notes.clone(),
                        created_by: identity.user_id,
                        items: totals.items.clone(),
                        created_utc: now,
                        updated_utc: now,
                    };
                    self.store.insert_invoice(&invoice).await?;
                    Ok(invoice)
                }
            })
            .await?;

        self.invalidate_lists(scope.tenant_id(), DocumentType::Invoice)
            .await;
        info!(invoice_id = %invoice.invoice_id, invoice_number = %invoice.invoice_number, "Invoice created");
        Ok(invoice)
    }

    pub async fn get_invoice(
        &self,
        scope: &Scope,
        invoice_id: Uuid,
    ) -> Result<Invoice, EngineError> {
        self.read_through(scope.tenant_id(), DocumentType::Invoice, invoice_id, || {
            async move { self.store.get_invoice(scope.tenant_id(), invoice_id).await }
        })
        .await?
        .filter(|i: &Invoice| i.company_id == scope.company_id())
        .ok_or_else(|| EngineError::not_found("Invoice not found"))
    }

    pub async fn list_invoices(
        &self,
        scope: &Scope,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, EngineError> {
        self.store
            .list_invoices(scope.tenant_id(), Some(scope.company_id()), filter)
            .await
    }

    #[instrument(skip(self, patch), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        scope: &Scope,
        invoice_id: Uuid,
        patch: UpdateInvoice,
    ) -> Result<Invoice, EngineError> {
        let mut invoice = self.get_invoice(scope, invoice_id).await?;

        if let Some(contact_id) = patch.contact_id {
            invoice.contact_id = Some(contact_id);
        }
        if let Some(issue_date) = patch.issue_date {
            invoice.issue_date = issue_date;
        }
        if let Some(due_date) = patch.due_date {
            invoice.due_date = Some(due_date);
        }
        if let Some(currency) = patch.currency {
            invoice.currency = currency;
        }
        if let Some(notes) = patch.notes {
            invoice.notes = Some(notes);
        }
        let rates_changed = patch.tax_rate.is_some() || patch.vat_rate.is_some();
        if let Some(tax_rate) = patch.tax_rate {
            validate_rate("tax rate", tax_rate)?;
            invoice.tax_rate = tax_rate;
        }
        if let Some(vat_rate) = patch.vat_rate {
            validate_rate("vat rate", vat_rate)?;
            invoice.vat_rate = Some(vat_rate);
        }

        if patch.items.is_some() || rates_changed {
            let drafts = match patch.items {
                Some(items) => {
                    validate_items(&items)?;
                    items
                }
                None => invoice.items.iter().map(|i| i.to_draft()).collect(),
            };
            let totals = calculator::calculate(&drafts, invoice.tax_rate, invoice.vat_rate);
            invoice.items = totals.items;
            invoice.subtotal = totals.subtotal;
            invoice.tax = totals.tax;
            invoice.vat = totals.vat;
            invoice.total = totals.total;
        }

        invoice.updated_utc = Utc::now();
        if !self.store.update_invoice(&invoice).await? {
            return Err(EngineError::not_found("Invoice not found"));
        }

        self.invalidate_document(scope.tenant_id(), DocumentType::Invoice, invoice_id)
            .await;
        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(
        &self,
        scope: &Scope,
        invoice_id: Uuid,
    ) -> Result<(), EngineError> {
        self.get_invoice(scope, invoice_id).await?;

        let dependents = self
            .store
            .count_dependents(scope.tenant_id(), DocumentType::Invoice, invoice_id)
            .await?;
        if !dependents.is_empty() {
            return Err(EngineError::HasDependents(dependents));
        }

        self.store
            .delete_invoice(scope.tenant_id(), invoice_id)
            .await?;
        self.invalidate_document(scope.tenant_id(), DocumentType::Invoice, invoice_id)
            .await;
        info!(invoice_id = %invoice_id, "Invoice deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice_status(
        &self,
        scope: &Scope,
        invoice_id: Uuid,
        new_status: InvoiceStatus,
    ) -> Result<Invoice, EngineError> {
        let mut invoice = self.get_invoice(scope, invoice_id).await?;
        if !invoice.status.can_transition_to(new_status) {
            return Err(EngineError::validation(format!(
                "illegal invoice status transition {} -> {}",
                invoice.status.as_str(),
                new_status.as_str()
            )));
        }
        invoice.status = new_status;
        invoice.updated_utc = Utc::now();
        if !self.store.update_invoice(&invoice).await? {
            return Err(EngineError::not_found("Invoice not found"));
        }
        self.invalidate_document(scope.tenant_id(), DocumentType::Invoice, invoice_id)
            .await;
        Ok(invoice)
    }

    /// Record a payment. `paid_amount` only ever grows; reaching the
    /// invoice total transitions `sent`/`overdue` to `paid` without an
    /// explicit status call.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, amount = %amount))]
    pub async fn record_payment(
        &self,
        scope: &Scope,
        invoice_id: Uuid,
        amount: Decimal,
    ) -> Result<Invoice, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::validation("payment amount must be positive"));
        }

        let mut invoice = self.get_invoice(scope, invoice_id).await?;
        match invoice.status {
            InvoiceStatus::Draft => {
                return Err(EngineError::validation(
                    "cannot record a payment on a draft invoice",
                ));
            }
            InvoiceStatus::Cancelled => {
                return Err(EngineError::validation(
                    "cannot record a payment on a cancelled invoice",
                ));
            }
            InvoiceStatus::Sent | InvoiceStatus::Overdue | InvoiceStatus::Paid => {}
        }

        invoice.paid_amount += amount;
        if invoice.paid_amount >= invoice.total && invoice.status != InvoiceStatus::Paid {
            invoice.status = InvoiceStatus::Paid;
        }
        invoice.updated_utc = Utc::now();
        if !self.store.update_invoice(&invoice).await? {
            return Err(EngineError::not_found("Invoice not found"));
        }

        self.invalidate_document(scope.tenant_id(), DocumentType::Invoice, invoice_id)
            .await;
        info!(
            invoice_id = %invoice_id,
            paid_amount = %invoice.paid_amount,
            status = invoice.status.as_str(),
            "Payment recorded"
        );
        Ok(invoice)
    }

    // -------------------------------------------------------------------------
    // Delivery Note Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, identity, input), fields(tenant_id = %scope.tenant_id(), company_id = %scope.company_id()))]
    pub async fn create_delivery_note(
        &self,
        scope: &Scope,
        identity: &Identity,
        input: CreateDeliveryNote,
    ) -> Result<DeliveryNote, EngineError> {
        validate_delivery_items(&input.items)?;
        self.verify_seller(scope.tenant_id(), input.seller_company_id)
            .await?;

        let (items, subtotal) = calculator::calculate_delivery(&input.items);
        let note = self
            .with_number_retry(DocumentType::DeliveryNote, "create_delivery_note", |_| {
                let items = &items;
                let input = &input;
                async move {
                    let number = numbering::next_number(
                        self.store.as_ref(),
                        scope.tenant_id(),
                        DocumentType::DeliveryNote,
                    )
                    .await?;
                    let now = Utc::now();
                    let note = DeliveryNote {
                        delivery_note_id: Uuid::new_v4(),
                        tenant_id: scope.tenant_id(),
                        delivery_number: number,
                        company_id: scope.company_id(),
                        seller_company_id: input.seller_company_id,
                        invoice_id: None,
                        order_id: None,
                        status: DeliveryStatus::Pending,
                        ship_date: input.ship_date,
                        delivery_date: None,
                        shipping_address: input.shipping_address.clone(),
                        carrier: input.carrier.clone(),
                        tracking_number: input.tracking_number.clone(),
                        subtotal,
                        tax: Decimal::ZERO,
                        total: subtotal,
                        created_by: identity.user_id,
                        items: items.clone(),
                        created_utc: now,
                        updated_utc: now,
                    };
                    self.store.insert_delivery_note(&note).await?;
                    Ok(note)
                }
            })
            .await?;

        self.invalidate_lists(scope.tenant_id(), DocumentType::DeliveryNote)
            .await;
        info!(delivery_note_id = %note.delivery_note_id, delivery_number = %note.delivery_number, "Delivery note created");
        Ok(note)
    }

    pub async fn get_delivery_note(
        &self,
        scope: &Scope,
        delivery_note_id: Uuid,
    ) -> Result<DeliveryNote, EngineError> {
        self.read_through(
            scope.tenant_id(),
            DocumentType::DeliveryNote,
            delivery_note_id,
            || async move {
                self.store
                    .get_delivery_note(scope.tenant_id(), delivery_note_id)
                    .await
            },
        )
        .await?
        .filter(|d: &DeliveryNote| d.company_id == scope.company_id())
        .ok_or_else(|| EngineError::not_found("Delivery note not found"))
    }

    pub async fn list_delivery_notes(
        &self,
        scope: &Scope,
        filter: &ListDeliveryNotesFilter,
    ) -> Result<Vec<DeliveryNote>, EngineError> {
        self.store
            .list_delivery_notes(scope.tenant_id(), Some(scope.company_id()), filter)
            .await
    }

    #[instrument(skip(self, patch), fields(delivery_note_id = %delivery_note_id))]
    pub async fn update_delivery_note(
        &self,
        scope: &Scope,
        delivery_note_id: Uuid,
        patch: UpdateDeliveryNote,
    ) -> Result<DeliveryNote, EngineError> {
        let mut note = self.get_delivery_note(scope, delivery_note_id).await?;

        if let Some(ship_date) = patch.ship_date {
            note.ship_date = Some(ship_date);
        }
        if let Some(delivery_date) = patch.delivery_date {
            note.delivery_date = Some(delivery_date);
        }
        if let Some(address) = patch.shipping_address {
            note.shipping_address = Some(address);
        }
        if let Some(carrier) = patch.carrier {
            note.carrier = Some(carrier);
        }
        if let Some(tracking) = patch.tracking_number {
            note.tracking_number = Some(tracking);
        }
        if let Some(items) = patch.items {
            validate_delivery_items(&items)?;
            let (items, subtotal) = calculator::calculate_delivery(&items);
            note.items = items;
            note.subtotal = subtotal;
            note.total = subtotal;
        }

        note.updated_utc = Utc::now();
        if !self.store.update_delivery_note(&note).await? {
            return Err(EngineError::not_found("Delivery note not found"));
        }

        self.invalidate_document(
            scope.tenant_id(),
            DocumentType::DeliveryNote,
            delivery_note_id,
        )
        .await;
        Ok(note)
    }

    #[instrument(skip(self), fields(delivery_note_id = %delivery_note_id))]
    pub async fn delete_delivery_note(
        &self,
        scope: &Scope,
        delivery_note_id: Uuid,
    ) -> Result<(), EngineError> {
        self.get_delivery_note(scope, delivery_note_id).await?;

        let dependents = self
            .store
            .count_dependents(
                scope.tenant_id(),
                DocumentType::DeliveryNote,
                delivery_note_id,
            )
            .await?;
        if !dependents.is_empty() {
            return Err(EngineError::HasDependents(dependents));
        }

        self.store
            .delete_delivery_note(scope.tenant_id(), delivery_note_id)
            .await?;
        self.invalidate_document(
            scope.tenant_id(),
            DocumentType::DeliveryNote,
            delivery_note_id,
        )
        .await;
        info!(delivery_note_id = %delivery_note_id, "Delivery note deleted");
        Ok(())
    }

    /// Move a delivery note along `pending → in_transit → delivered`,
    /// auto-stamping the ship/delivery date when absent.
    #[instrument(skip(self), fields(delivery_note_id = %delivery_note_id))]
    pub async fn update_delivery_status(
        &self,
        scope: &Scope,
        delivery_note_id: Uuid,
        new_status: DeliveryStatus,
    ) -> Result<DeliveryNote, EngineError> {
        let mut note = self.get_delivery_note(scope, delivery_note_id).await?;
        if !note.status.can_transition_to(new_status) {
            return Err(EngineError::validation(format!(
                "illegal delivery status transition {} -> {}",
                note.status.as_str(),
                new_status.as_str()
            )));
        }

        match new_status {
            DeliveryStatus::InTransit => {
                note.ship_date.get_or_insert_with(|| Utc::now().date_naive());
            }
            DeliveryStatus::Delivered => {
                note.delivery_date
                    .get_or_insert_with(|| Utc::now().date_naive());
            }
            DeliveryStatus::Pending => {}
        }

        note.status = new_status;
        note.updated_utc = Utc::now();
        if !self.store.update_delivery_note(&note).await? {
            return Err(EngineError::not_found("Delivery note not found"));
        }

        self.invalidate_document(
            scope.tenant_id(),
            DocumentType::DeliveryNote,
            delivery_note_id,
        )
        .await;
        Ok(note)
    }
}
