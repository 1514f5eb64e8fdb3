//! Document number generation.
//!
//! Numbers are human-readable, per-type sequences: `PREFIX-NNNNNN`
//! (`QUO-000001`, `INV-000042`, ...), scoped per tenant. The generation
//! strategy is deliberately "read max, add one": under concurrent writers
//! two requests can mint the same number, and the unique constraint plus
//! the lifecycle's bounded retry resolves the race.

use service_core::error::EngineError;
use uuid::Uuid;

use crate::models::DocumentType;
use crate::store::DocumentStore;

const SEQUENCE_WIDTH: usize = 6;

/// Parse the numeric sequence from a formatted document number.
/// Returns `None` for numbers that do not end in a digit run (caller
/// overrides with custom formats simply don't advance the sequence).
pub fn parse_sequence(number: &str) -> Option<u64> {
    let digits: String = number
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Format a document number for the given type and sequence.
pub fn format_number(doc_type: DocumentType, sequence: u64) -> String {
    format!(
        "{}-{:0width$}",
        doc_type.number_prefix(),
        sequence,
        width = SEQUENCE_WIDTH
    )
}

/// Produce the next sequential number for a document type.
///
/// Not collision-proof on its own; callers wrap the subsequent insert in
/// a bounded retry keyed on the document-number conflict kind.
pub async fn next_number(
    store: &dyn DocumentStore,
    tenant_id: Uuid,
    doc_type: DocumentType,
) -> Result<String, EngineError> {
    let last = store.last_document_number(tenant_id, doc_type).await?;
    let next = last
        .as_deref()
        .and_then(parse_sequence)
        .unwrap_or(0)
        .saturating_add(1);
    Ok(format_number(doc_type, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_type_prefix_and_padding() {
        assert_eq!(format_number(DocumentType::Quote, 1), "QUO-000001");
        assert_eq!(format_number(DocumentType::Invoice, 42), "INV-000042");
        assert_eq!(format_number(DocumentType::Order, 1234567), "ORD-1234567");
    }

    #[test]
    fn parses_sequence_back_out() {
        assert_eq!(parse_sequence("INV-000042"), Some(42));
        assert_eq!(parse_sequence("DEL-999999"), Some(999999));
        assert_eq!(parse_sequence("CUSTOM"), None);
    }

    #[tokio::test]
    async fn sequences_are_scoped_per_type() {
        use crate::store::MemoryStore;

        let store = MemoryStore::new();
        let tenant = Uuid::new_v4();

        assert_eq!(
            next_number(&store, tenant, DocumentType::Quote)
                .await
                .unwrap(),
            "QUO-000001"
        );
        // An invoice number does not advance the quote sequence.
        assert_eq!(
            next_number(&store, tenant, DocumentType::Invoice)
                .await
                .unwrap(),
            "INV-000001"
        );
    }
}
