//! In-process implementation of [`DocumentStore`].
//!
//! Backs the test suite and single-node deployments. All state lives
//! behind a single `RwLock`, so every trait method is atomic with respect
//! to every other, which is exactly the transactional contract the
//! interface demands.

use async_trait::async_trait;
use service_core::error::{ConflictKind, DependentCount, EngineError};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ConvertedDocument, DocumentStore};
use crate::models::{
    ChainEdge, Company, DeliveryNote, DocumentType, Invoice, ListDeliveryNotesFilter,
    ListInvoicesFilter, ListOrdersFilter, ListQuotesFilter, Order, Quote,
};

#[derive(Default)]
struct State {
    companies: HashMap<Uuid, Company>,
    members: HashMap<Uuid, HashSet<Uuid>>,
    quotes: HashMap<Uuid, Quote>,
    orders: HashMap<Uuid, Order>,
    invoices: HashMap<Uuid, Invoice>,
    delivery_notes: HashMap<Uuid, DeliveryNote>,
    /// Unique constraint on (tenant, type, number). Claims survive
    /// document deletion so a number is never reissued.
    numbers: HashSet<(Uuid, DocumentType, String)>,
    edges: Vec<ChainEdge>,
}

impl State {
    fn claim_number(
        &mut self,
        tenant_id: Uuid,
        doc_type: DocumentType,
        number: &str,
    ) -> Result<(), EngineError> {
        let key = (tenant_id, doc_type, number.to_string());
        if self.numbers.contains(&key) {
            return Err(EngineError::Conflict {
                kind: ConflictKind::DocumentNumber,
                message: format!(
                    "duplicate {} number {}",
                    doc_type.as_str(),
                    number
                ),
            });
        }
        self.numbers.insert(key);
        Ok(())
    }

    fn insert_document(&mut self, document: &ConvertedDocument) -> Result<(), EngineError> {
        match document {
            ConvertedDocument::Order(order) => {
                self.claim_number(order.tenant_id, DocumentType::Order, &order.order_number)?;
                self.orders.insert(order.order_id, order.clone());
            }
            ConvertedDocument::Invoice(invoice) => {
                self.claim_number(
                    invoice.tenant_id,
                    DocumentType::Invoice,
                    &invoice.invoice_number,
                )?;
                self.invoices.insert(invoice.invoice_id, invoice.clone());
            }
            ConvertedDocument::DeliveryNote(note) => {
                self.claim_number(
                    note.tenant_id,
                    DocumentType::DeliveryNote,
                    &note.delivery_number,
                )?;
                self.delivery_notes
                    .insert(note.delivery_note_id, note.clone());
            }
        }
        Ok(())
    }
}

fn page<T: Clone>(
    mut rows: Vec<(Uuid, T)>,
    page_size: i32,
    page_token: Option<Uuid>,
) -> Vec<T> {
    rows.sort_by_key(|(id, _)| *id);
    let limit = if page_size <= 0 {
        50
    } else {
        page_size.min(100)
    } as usize;
    rows.into_iter()
        .filter(|(id, _)| page_token.map_or(true, |cursor| *id > cursor))
        .take(limit)
        .map(|(_, row)| row)
        .collect()
}

fn in_range(
    date: chrono::NaiveDate,
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
) -> bool {
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    // -------------------------------------------------------------------------
    // Company Operations
    // -------------------------------------------------------------------------

    async fn insert_company(&self, company: &Company) -> Result<(), EngineError> {
        self.state
            .write()
            .await
            .companies
            .insert(company.company_id, company.clone());
        Ok(())
    }

    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, EngineError> {
        Ok(self.state.read().await.companies.get(&company_id).cloned())
    }

    async fn is_company_member(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .members
            .get(&company_id)
            .is_some_and(|m| m.contains(&user_id)))
    }

    async fn add_company_member(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), EngineError> {
        self.state
            .write()
            .await
            .members
            .entry(company_id)
            .or_default()
            .insert(user_id);
        Ok(())
    }

    async fn delete_company(
        &self,
        tenant_id: Uuid,
        company_id: Uuid,
    ) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let matches = state
            .companies
            .get(&company_id)
            .is_some_and(|c| c.tenant_id == tenant_id);
        if matches {
            state.companies.remove(&company_id);
            state.members.remove(&company_id);
        }
        Ok(matches)
    }

    async fn count_company_documents(
        &self,
        tenant_id: Uuid,
        company_id: Uuid,
    ) -> Result<Vec<DependentCount>, EngineError> {
        let state = self.state.read().await;
        let mut counts = Vec::new();
        let quotes = state
            .quotes
            .values()
            .filter(|q| q.tenant_id == tenant_id && q.company_id == company_id)
            .count() as u64;
        if quotes > 0 {
            counts.push(DependentCount::new("quote", quotes));
        }
        let orders = state
            .orders
            .values()
            .filter(|o| o.tenant_id == tenant_id && o.company_id == company_id)
            .count() as u64;
        if orders > 0 {
            counts.push(DependentCount::new("order", orders));
        }
        let invoices = state
            .invoices
            .values()
            .filter(|i| i.tenant_id == tenant_id && i.company_id == company_id)
            .count() as u64;
        if invoices > 0 {
            counts.push(DependentCount::new("invoice", invoices));
        }
        let notes = state
            .delivery_notes
            .values()
            .filter(|d| d.tenant_id == tenant_id && d.company_id == company_id)
            .count() as u64;
        if notes > 0 {
            counts.push(DependentCount::new("delivery_note", notes));
        }
        Ok(counts)
    }

    // -------------------------------------------------------------------------
    // Quote Operations
    // -------------------------------------------------------------------------

    async fn insert_quote(&self, quote: &Quote) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state.claim_number(quote.tenant_id, DocumentType::Quote, &quote.quote_number)?;
        state.quotes.insert(quote.quote_id, quote.clone());
        Ok(())
    }

    async fn get_quote(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<Option<Quote>, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .quotes
            .get(&quote_id)
            .filter(|q| q.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_quote(&self, quote: &Quote) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let exists = state
            .quotes
            .get(&quote.quote_id)
            .is_some_and(|q| q.tenant_id == quote.tenant_id);
        if exists {
            state.quotes.insert(quote.quote_id, quote.clone());
        }
        Ok(exists)
    }

    async fn delete_quote(&self, tenant_id: Uuid, quote_id: Uuid) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let matches = state
            .quotes
            .get(&quote_id)
            .is_some_and(|q| q.tenant_id == tenant_id);
        if matches {
            state.quotes.remove(&quote_id);
        }
        Ok(matches)
    }

    async fn list_quotes(
        &self,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        filter: &ListQuotesFilter,
    ) -> Result<Vec<Quote>, EngineError> {
        let state = self.state.read().await;
        let rows = state
            .quotes
            .values()
            .filter(|q| q.tenant_id == tenant_id)
            .filter(|q| company_id.map_or(true, |c| q.company_id == c))
            .filter(|q| filter.status.map_or(true, |s| q.status == s))
            .filter(|q| in_range(q.issue_date, filter.start_date, filter.end_date))
            .map(|q| (q.quote_id, q.clone()))
            .collect();
        Ok(page(rows, filter.page_size, filter.page_token))
    }

    // -------------------------------------------------------------------------
    // Order Operations
    // -------------------------------------------------------------------------

    async fn insert_order(&self, order: &Order) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state.claim_number(order.tenant_id, DocumentType::Order, &order.order_number)?;
        state.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn get_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .get(&order_id)
            .filter(|o| o.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_order(&self, order: &Order) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let exists = state
            .orders
            .get(&order.order_id)
            .is_some_and(|o| o.tenant_id == order.tenant_id);
        if exists {
            state.orders.insert(order.order_id, order.clone());
        }
        Ok(exists)
    }

    async fn delete_order(&self, tenant_id: Uuid, order_id: Uuid) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let matches = state
            .orders
            .get(&order_id)
            .is_some_and(|o| o.tenant_id == tenant_id);
        if matches {
            state.orders.remove(&order_id);
        }
        Ok(matches)
    }

    async fn list_orders(
        &self,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        filter: &ListOrdersFilter,
    ) -> Result<Vec<Order>, EngineError> {
        let state = self.state.read().await;
        let rows = state
            .orders
            .values()
            .filter(|o| o.tenant_id == tenant_id)
            .filter(|o| company_id.map_or(true, |c| o.company_id == c))
            .filter(|o| {
                filter
                    .source_quote_id
                    .map_or(true, |q| o.source_quote_id == Some(q))
            })
            .filter(|o| in_range(o.order_date, filter.start_date, filter.end_date))
            .map(|o| (o.order_id, o.clone()))
            .collect();
        Ok(page(rows, filter.page_size, filter.page_token))
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state.claim_number(
            invoice.tenant_id,
            DocumentType::Invoice,
            &invoice.invoice_number,
        )?;
        state.invoices.insert(invoice.invoice_id, invoice.clone());
        Ok(())
    }

    async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .invoices
            .get(&invoice_id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let exists = state
            .invoices
            .get(&invoice.invoice_id)
            .is_some_and(|i| i.tenant_id == invoice.tenant_id);
        if exists {
            state.invoices.insert(invoice.invoice_id, invoice.clone());
        }
        Ok(exists)
    }

    async fn delete_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let matches = state
            .invoices
            .get(&invoice_id)
            .is_some_and(|i| i.tenant_id == tenant_id);
        if matches {
            state.invoices.remove(&invoice_id);
        }
        Ok(matches)
    }

    async fn list_invoices(
        &self,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, EngineError> {
        let state = self.state.read().await;
        let rows = state
            .invoices
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .filter(|i| company_id.map_or(true, |c| i.company_id == c))
            .filter(|i| filter.status.map_or(true, |s| i.status == s))
            .filter(|i| in_range(i.issue_date, filter.start_date, filter.end_date))
            .map(|i| (i.invoice_id, i.clone()))
            .collect();
        Ok(page(rows, filter.page_size, filter.page_token))
    }

    // -------------------------------------------------------------------------
    // Delivery Note Operations
    // -------------------------------------------------------------------------

    async fn insert_delivery_note(&self, note: &DeliveryNote) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state.claim_number(
            note.tenant_id,
            DocumentType::DeliveryNote,
            &note.delivery_number,
        )?;
        state
            .delivery_notes
            .insert(note.delivery_note_id, note.clone());
        Ok(())
    }

    async fn get_delivery_note(
        &self,
        tenant_id: Uuid,
        delivery_note_id: Uuid,
    ) -> Result<Option<DeliveryNote>, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .delivery_notes
            .get(&delivery_note_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn update_delivery_note(&self, note: &DeliveryNote) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let exists = state
            .delivery_notes
            .get(&note.delivery_note_id)
            .is_some_and(|d| d.tenant_id == note.tenant_id);
        if exists {
            state
                .delivery_notes
                .insert(note.delivery_note_id, note.clone());
        }
        Ok(exists)
    }

    async fn delete_delivery_note(
        &self,
        tenant_id: Uuid,
        delivery_note_id: Uuid,
    ) -> Result<bool, EngineError> {
        let mut state = self.state.write().await;
        let matches = state
            .delivery_notes
            .get(&delivery_note_id)
            .is_some_and(|d| d.tenant_id == tenant_id);
        if matches {
            state.delivery_notes.remove(&delivery_note_id);
        }
        Ok(matches)
    }

    async fn list_delivery_notes(
        &self,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        filter: &ListDeliveryNotesFilter,
    ) -> Result<Vec<DeliveryNote>, EngineError> {
        let state = self.state.read().await;
        let rows = state
            .delivery_notes
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .filter(|d| company_id.map_or(true, |c| d.company_id == c))
            .filter(|d| filter.status.map_or(true, |s| d.status == s))
            .filter(|d| {
                in_range(
                    d.created_utc.date_naive(),
                    filter.start_date,
                    filter.end_date,
                )
            })
            .map(|d| (d.delivery_note_id, d.clone()))
            .collect();
        Ok(page(rows, filter.page_size, filter.page_token))
    }

    // -------------------------------------------------------------------------
    // Numbering and Chain Operations
    // -------------------------------------------------------------------------

    async fn last_document_number(
        &self,
        tenant_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<Option<String>, EngineError> {
        let state = self.state.read().await;
        Ok(state
            .numbers
            .iter()
            .filter(|(t, ty, _)| *t == tenant_id && *ty == doc_type)
            .map(|(_, _, number)| number.clone())
            .max_by_key(|number| crate::services::numbering::parse_sequence(number).unwrap_or(0)))
    }

    async fn insert_converted(
        &self,
        document: &ConvertedDocument,
        edge: &ChainEdge,
    ) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state.insert_document(document)?;
        state.edges.push(edge.clone());
        Ok(())
    }

    async fn edges_from(
        &self,
        tenant_id: Uuid,
        from_type: DocumentType,
        from_id: Uuid,
    ) -> Result<Vec<ChainEdge>, EngineError> {
        Ok(self
            .state
            .read()
            .await
            .edges
            .iter()
            .filter(|e| {
                e.tenant_id == tenant_id && e.from_type == from_type && e.from_id == from_id
            })
            .cloned()
            .collect())
    }

    async fn count_dependents(
        &self,
        tenant_id: Uuid,
        from_type: DocumentType,
        from_id: Uuid,
    ) -> Result<Vec<DependentCount>, EngineError> {
        let state = self.state.read().await;
        let mut by_type: HashMap<DocumentType, u64> = HashMap::new();
        for edge in state
            .edges
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.from_type == from_type && e.from_id == from_id)
        {
            *by_type.entry(edge.to_type).or_insert(0) += 1;
        }
        let mut counts: Vec<DependentCount> = by_type
            .into_iter()
            .map(|(ty, count)| DependentCount::new(ty.as_str(), count))
            .collect();
        counts.sort_by(|a, b| a.record_type.cmp(&b.record_type));
        Ok(counts)
    }
}
