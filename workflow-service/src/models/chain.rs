//! Document chain: the append-only provenance graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four document types the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Quote,
    Order,
    Invoice,
    DeliveryNote,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Quote => "quote",
            DocumentType::Order => "order",
            DocumentType::Invoice => "invoice",
            DocumentType::DeliveryNote => "delivery_note",
        }
    }

    /// Prefix of the human-readable document number for this type.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentType::Quote => "QUO",
            DocumentType::Order => "ORD",
            DocumentType::Invoice => "INV",
            DocumentType::DeliveryNote => "DEL",
        }
    }
}

/// Directed conversion edge. Append-only: edges are never deleted, even
/// when the target document is, so resolution must tolerate dangling
/// targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEdge {
    pub tenant_id: Uuid,
    pub from_type: DocumentType,
    pub from_id: Uuid,
    pub to_type: DocumentType,
    pub to_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl ChainEdge {
    pub fn new(
        tenant_id: Uuid,
        from_type: DocumentType,
        from_id: Uuid,
        to_type: DocumentType,
        to_id: Uuid,
    ) -> Self {
        Self {
            tenant_id,
            from_type,
            from_id,
            to_type,
            to_id,
            created_utc: Utc::now(),
        }
    }
}

/// One node of a resolved chain tree.
#[derive(Debug, Clone, Serialize)]
pub struct ChainNode {
    pub doc_type: DocumentType,
    pub id: Uuid,
    /// Current status of the document, absent when the target has been
    /// deleted since the edge was recorded.
    pub status: Option<String>,
    /// The edge points at a document that no longer exists.
    pub missing: bool,
    pub children: Vec<ChainNode>,
}
