//! Tenant/company scope guard.
//!
//! Resolves and validates the `{company, tenant}` pair exactly once per
//! request. Idempotent and side-effect free; downstream services accept
//! the resolved [`Scope`] and never re-derive a company id themselves.

use service_core::error::EngineError;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{Identity, Scope, ScopeCandidate};
use crate::store::DocumentStore;

pub struct ScopeResolver {
    store: Arc<dyn DocumentStore>,
}

impl ScopeResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Validate that the candidate company belongs to the caller's tenant
    /// and that the caller may act on it.
    ///
    /// Privileged roles (tenant admin, superadmin) bypass the per-company
    /// membership check but never the tenant-equality check.
    #[instrument(skip(self, candidate, identity), fields(user_id = %identity.user_id))]
    pub async fn resolve(
        &self,
        candidate: &ScopeCandidate,
        identity: &Identity,
    ) -> Result<Scope, EngineError> {
        let tenant_id = self.require_tenant(identity)?;

        let company_id = candidate.first().ok_or_else(|| {
            EngineError::MissingScope(anyhow::anyhow!(
                "no company id present in route, query, header, or body"
            ))
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

        if !identity.role.is_privileged()
            && !self
                .store
                .is_company_member(company_id, identity.user_id)
                .await?
        {
            return Err(EngineError::ScopeMismatch(anyhow::anyhow!(
                "caller is not a member of company {}",
                company_id
            )));
        }

        Ok(Scope::new(company_id, tenant_id))
    }

    /// Tenant-level privilege check used by conversions: requires a tenant
    /// on the identity, without resolving a company.
    pub fn require_tenant(&self, identity: &Identity) -> Result<Uuid, EngineError> {
        identity.tenant().ok_or_else(|| {
            EngineError::UnauthorizedTenant(anyhow::anyhow!(
                "caller has no tenant context"
            ))
        })
    }
}
