//! Data models for workflow-service.

pub mod chain;
pub mod company;
pub mod delivery_note;
pub mod identity;
pub mod invoice;
pub mod line_item;
pub mod order;
pub mod quote;

pub use chain::{ChainEdge, ChainNode, DocumentType};
pub use company::{Company, CompanySnapshot, CreateCompany};
pub use delivery_note::{
    CreateDeliveryNote, DeliveryItem, DeliveryItemDraft, DeliveryNote, DeliveryStatus,
    ListDeliveryNotesFilter, UpdateDeliveryNote,
};
pub use identity::{Identity, Role, Scope, ScopeCandidate};
pub use invoice::{CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, UpdateInvoice};
pub use line_item::{LineItem, LineItemDraft};
pub use order::{CreateOrder, ListOrdersFilter, Order, UpdateOrder};
pub use quote::{CreateQuote, ListQuotesFilter, Quote, QuoteStatus, UpdateQuote};
