//! Cache key shapes for document reads and list views.
//!
//! Single-document keys are populated read-through by the lifecycle
//! service and deleted after successful writes. List keys are only
//! invalidated here; the surrounding platform populates them.

use uuid::Uuid;

use crate::models::DocumentType;

/// Key for a single document: `wf:{tenant}:{type}:{id}`.
pub fn document_key(tenant_id: Uuid, doc_type: DocumentType, id: Uuid) -> String {
    format!("wf:{}:{}:{}", tenant_id, doc_type.as_str(), id)
}

/// Prefix covering every cached list view of a type:
/// `wf:{tenant}:{type}:list`.
pub fn list_pattern(tenant_id: Uuid, doc_type: DocumentType) -> String {
    format!("wf:{}:{}:list", tenant_id, doc_type.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_pattern_is_a_prefix_of_no_document_key() {
        let tenant = Uuid::new_v4();
        let id = Uuid::new_v4();
        let key = document_key(tenant, DocumentType::Quote, id);
        let pattern = list_pattern(tenant, DocumentType::Quote);
        assert!(!key.starts_with(&pattern));
    }
}
