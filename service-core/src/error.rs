use thiserror::Error;

/// Structured conflict classification reported by the persistence layer.
///
/// The retry path must never decide retryability by string-matching a
/// driver message; the store maps its unique-constraint violations to one
/// of these kinds instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The per-type document-number uniqueness constraint.
    DocumentNumber,
    /// Any other uniqueness or concurrency conflict.
    Other,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::DocumentNumber => "document_number",
            ConflictKind::Other => "other",
        }
    }
}

/// A record type blocking a deletion, with how many rows reference the
/// target. Surfaced inside `EngineError::HasDependents` so callers can
/// explain the rejection to the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentCount {
    pub record_type: String,
    pub count: u64,
}

impl DependentCount {
    pub fn new(record_type: impl Into<String>, count: u64) -> Self {
        Self {
            record_type: record_type.into(),
            count,
        }
    }
}

fn format_dependents(dependents: &[DependentCount]) -> String {
    dependents
        .iter()
        .map(|d| format!("{} ({})", d.record_type, d.count))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(anyhow::Error),

    #[error("Missing scope: {0}")]
    MissingScope(anyhow::Error),

    #[error("Unauthorized tenant: {0}")]
    UnauthorizedTenant(anyhow::Error),

    #[error("Scope mismatch: {0}")]
    ScopeMismatch(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Delete blocked by dependents: {}", format_dependents(.0))]
    HasDependents(Vec<DependentCount>),

    #[error("Conflict ({}): {message}", .kind.as_str())]
    Conflict {
        kind: ConflictKind,
        message: String,
    },

    #[error("Number generation exhausted for {document_type} after {attempts} attempts")]
    NumberGenerationExhausted {
        document_type: String,
        attempts: u32,
    },

    #[error("Document chain exceeds depth cap ({depth})")]
    ChainTooDeep { depth: u32 },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Coarse response class for the (external) routing layer. The engine
/// never constructs HTTP status codes or envelopes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(anyhow::anyhow!(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(anyhow::anyhow!(msg.into()))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Validation(_) | EngineError::HasDependents(_) => ErrorClass::BadRequest,
            EngineError::UnauthorizedTenant(_) => ErrorClass::Unauthorized,
            EngineError::MissingScope(_) | EngineError::ScopeMismatch(_) => ErrorClass::Forbidden,
            EngineError::NotFound(_) => ErrorClass::NotFound,
            EngineError::Conflict { .. } => ErrorClass::Conflict,
            EngineError::NumberGenerationExhausted { .. }
            | EngineError::ChainTooDeep { .. }
            | EngineError::Storage(_) => ErrorClass::Internal,
        }
    }

    /// Whether this error is expected control flow (validation/scope) and
    /// should not be logged as a failure.
    pub fn is_expected(&self) -> bool {
        !matches!(self.class(), ErrorClass::Internal)
    }

    /// True when the error is a uniqueness conflict of the given kind.
    pub fn is_conflict(&self, kind: ConflictKind) -> bool {
        matches!(self, EngineError::Conflict { kind: k, .. } if *k == kind)
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Storage(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_dependents_enumerates_blocking_records() {
        let err = EngineError::HasDependents(vec![
            DependentCount::new("order", 2),
            DependentCount::new("invoice", 1),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("order (2)"));
        assert!(msg.contains("invoice (1)"));
    }

    #[test]
    fn error_classes() {
        assert_eq!(
            EngineError::validation("no items").class(),
            ErrorClass::BadRequest
        );
        assert_eq!(
            EngineError::ScopeMismatch(anyhow::anyhow!("wrong tenant")).class(),
            ErrorClass::Forbidden
        );
        assert_eq!(
            EngineError::NumberGenerationExhausted {
                document_type: "invoice".into(),
                attempts: 5
            }
            .class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn conflict_kind_matching() {
        let err = EngineError::Conflict {
            kind: ConflictKind::DocumentNumber,
            message: "duplicate number".into(),
        };
        assert!(err.is_conflict(ConflictKind::DocumentNumber));
        assert!(!err.is_conflict(ConflictKind::Other));
        assert!(err.is_expected());
    }
}
