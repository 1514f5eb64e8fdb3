//! Document chain resolver.
//!
//! Walks recorded conversion edges forward from a quote and builds the
//! full Quote→Orders→Invoices→DeliveryNotes tree. Deleted targets render
//! as `missing` leaves, never errors, and traversal is capped at a hard
//! hop depth so a corrupted (cyclic) edge set cannot loop.

use futures::FutureExt;
use futures::future::BoxFuture;
use service_core::error::EngineError;
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::models::{ChainNode, DocumentType};
use crate::store::DocumentStore;

pub struct ChainResolver {
    store: Arc<dyn DocumentStore>,
    max_depth: u32,
}

impl ChainResolver {
    pub fn new(store: Arc<dyn DocumentStore>, max_depth: u32) -> Self {
        Self { store, max_depth }
    }

    /// Resolve the full conversion tree rooted at a quote.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, quote_id = %quote_id))]
    pub async fn document_chain(
        &self,
        tenant_id: Uuid,
        quote_id: Uuid,
    ) -> Result<ChainNode, EngineError> {
        let root = self
            .resolve_node(tenant_id, DocumentType::Quote, quote_id, 0)
            .await?;
        if root.missing {
            return Err(EngineError::not_found("Quote not found"));
        }
        Ok(root)
    }

    fn resolve_node(
        &self,
        tenant_id: Uuid,
        doc_type: DocumentType,
        id: Uuid,
        depth: u32,
    ) -> BoxFuture<'_, Result<ChainNode, EngineError>> {
        async move {
            if depth > self.max_depth {
                // The write path never records a cycle; hitting the cap
                // means the edge set is corrupt.
                error!(depth, "Document chain exceeds depth cap");
                return Err(EngineError::ChainTooDeep { depth });
            }

            let Some(status) = self.document_status(tenant_id, doc_type, id).await? else {
                return Ok(ChainNode {
                    doc_type,
                    id,
                    status: None,
                    missing: true,
                    children: Vec::new(),
                });
            };

            let edges = self.store.edges_from(tenant_id, doc_type, id).await?;
            let mut children = Vec::with_capacity(edges.len());
            for edge in edges {
                children.push(
                    self.resolve_node(tenant_id, edge.to_type, edge.to_id, depth + 1)
                        .await?,
                );
            }

            Ok(ChainNode {
                doc_type,
                id,
                status: Some(status),
                missing: false,
                children,
            })
        }
        .boxed()
    }

    async fn document_status(
        &self,
        tenant_id: Uuid,
        doc_type: DocumentType,
        id: Uuid,
    ) -> Result<Option<String>, EngineError> {
        Ok(match doc_type {
            DocumentType::Quote => self
                .store
                .get_quote(tenant_id, id)
                .await?
                .map(|q| q.status.as_str().to_string()),
            DocumentType::Order => self.store.get_order(tenant_id, id).await?.map(|o| o.status),
            DocumentType::Invoice => self
                .store
                .get_invoice(tenant_id, id)
                .await?
                .map(|i| i.status.as_str().to_string()),
            DocumentType::DeliveryNote => self
                .store
                .get_delivery_note(tenant_id, id)
                .await?
                .map(|d| d.status.as_str().to_string()),
        })
    }
}
