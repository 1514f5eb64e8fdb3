//! Persistence interface for the workflow engine.
//!
//! The engine does not own a database; it consumes this interface. Each
//! method is an atomic unit: `insert_*` persists a document header and its
//! items as one transaction, and [`DocumentStore::insert_converted`]
//! persists a conversion target together with its provenance edge so a
//! crash can never leave an orphaned header or a dangling edge source.
//!
//! Uniqueness violations on document numbers must surface as
//! `EngineError::Conflict { kind: ConflictKind::DocumentNumber }`; the
//! retry path keys off that structured kind, never off driver messages.

pub mod memory;

use async_trait::async_trait;
use service_core::error::{DependentCount, EngineError};
use uuid::Uuid;

use crate::models::{
    ChainEdge, Company, DeliveryNote, DocumentType, Invoice, ListDeliveryNotesFilter,
    ListInvoicesFilter, ListOrdersFilter, ListQuotesFilter, Order, Quote,
};

pub use memory::MemoryStore;

/// A document created by a conversion, persisted together with its edge.
#[derive(Debug, Clone)]
pub enum ConvertedDocument {
    Order(Order),
    Invoice(Invoice),
    DeliveryNote(DeliveryNote),
}

impl ConvertedDocument {
    pub fn doc_type(&self) -> DocumentType {
        match self {
            ConvertedDocument::Order(_) => DocumentType::Order,
            ConvertedDocument::Invoice(_) => DocumentType::Invoice,
            ConvertedDocument::DeliveryNote(_) => DocumentType::DeliveryNote,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ConvertedDocument::Order(o) => o.order_id,
            ConvertedDocument::Invoice(i) => i.invoice_id,
            ConvertedDocument::DeliveryNote(d) => d.delivery_note_id,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Company Operations
    // -------------------------------------------------------------------------

    async fn insert_company(&self, company: &Company) -> Result<(), EngineError>;
    async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, EngineError>;
    async fn is_company_member(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, EngineError>;
    async fn add_company_member(&self, company_id: Uuid, user_id: Uuid)
    -> Result<(), EngineError>;
    async fn delete_company(&self, tenant_id: Uuid, company_id: Uuid)
    -> Result<bool, EngineError>;
    /// Raw dependent counts backing the company deletion guard: how many
    /// documents of each type reference this company as the customer.
    async fn count_company_documents(
        &self,
        tenant_id: Uuid,
        company_id: Uuid,
    ) -> Result<Vec<DependentCount>, EngineError>;

    // -------------------------------------------------------------------------
    // Quote Operations
    // -------------------------------------------------------------------------

    async fn insert_quote(&self, quote: &Quote) -> Result<(), EngineError>;
    async fn get_quote(&self, tenant_id: Uuid, quote_id: Uuid)
    -> Result<Option<Quote>, EngineError>;
    /// Replaces the stored row and its item set. Returns `false` when the
    /// quote does not exist within the tenant.
    async fn update_quote(&self, quote: &Quote) -> Result<bool, EngineError>;
    async fn delete_quote(&self, tenant_id: Uuid, quote_id: Uuid) -> Result<bool, EngineError>;
    async fn list_quotes(
        &self,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        filter: &ListQuotesFilter,
    ) -> Result<Vec<Quote>, EngineError>;

    // -------------------------------------------------------------------------
    // Order Operations
    // -------------------------------------------------------------------------

    async fn insert_order(&self, order: &Order) -> Result<(), EngineError>;
    async fn get_order(&self, tenant_id: Uuid, order_id: Uuid)
    -> Result<Option<Order>, EngineError>;
    async fn update_order(&self, order: &Order) -> Result<bool, EngineError>;
    async fn delete_order(&self, tenant_id: Uuid, order_id: Uuid) -> Result<bool, EngineError>;
    async fn list_orders(
        &self,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        filter: &ListOrdersFilter,
    ) -> Result<Vec<Order>, EngineError>;

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), EngineError>;
    async fn get_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, EngineError>;
    async fn update_invoice(&self, invoice: &Invoice) -> Result<bool, EngineError>;
    async fn delete_invoice(&self, tenant_id: Uuid, invoice_id: Uuid)
    -> Result<bool, EngineError>;
    async fn list_invoices(
        &self,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, EngineError>;

    // -------------------------------------------------------------------------
    // Delivery Note Operations
    // -------------------------------------------------------------------------

    async fn insert_delivery_note(&self, note: &DeliveryNote) -> Result<(), EngineError>;
    async fn get_delivery_note(
        &self,
        tenant_id: Uuid,
        delivery_note_id: Uuid,
    ) -> Result<Option<DeliveryNote>, EngineError>;
    async fn update_delivery_note(&self, note: &DeliveryNote) -> Result<bool, EngineError>;
    async fn delete_delivery_note(
        &self,
        tenant_id: Uuid,
        delivery_note_id: Uuid,
    ) -> Result<bool, EngineError>;
    async fn list_delivery_notes(
        &self,
        tenant_id: Uuid,
        company_id: Option<Uuid>,
        filter: &ListDeliveryNotesFilter,
    ) -> Result<Vec<DeliveryNote>, EngineError>;

    // -------------------------------------------------------------------------
    // Numbering and Chain Operations
    // -------------------------------------------------------------------------

    /// Highest assigned document number for the type within the tenant.
    /// Deliberately racy under concurrent writers; the unique constraint
    /// plus the caller's bounded retry is the correctness mechanism.
    async fn last_document_number(
        &self,
        tenant_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<Option<String>, EngineError>;

    /// Persist a conversion target and its provenance edge atomically.
    async fn insert_converted(
        &self,
        document: &ConvertedDocument,
        edge: &ChainEdge,
    ) -> Result<(), EngineError>;

    async fn edges_from(
        &self,
        tenant_id: Uuid,
        from_type: DocumentType,
        from_id: Uuid,
    ) -> Result<Vec<ChainEdge>, EngineError>;

    /// Dependent counts backing the document deletion guard: outgoing
    /// chain edges grouped by target type.
    async fn count_dependents(
        &self,
        tenant_id: Uuid,
        from_type: DocumentType,
        from_id: Uuid,
    ) -> Result<Vec<DependentCount>, EngineError>;
}
