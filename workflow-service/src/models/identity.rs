//! Caller identity and resolved scope.
//!
//! The scope guard produces a [`Scope`] exactly once per request; every
//! downstream read/write filters on it. Nothing outside the guard can
//! construct one, so ad hoc re-derivation of a company id downstream is
//! a compile error rather than a code-review catch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only privilege axis the engine inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    TenantAdmin,
    Superadmin,
}

impl Role {
    /// Privileged roles skip the per-company membership check. They never
    /// skip the tenant-equality check.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::TenantAdmin | Role::Superadmin)
    }
}

/// Authenticated caller, handed in by the upstream auth middleware.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
    pub active_tenant_id: Option<Uuid>,
}

impl Identity {
    /// The tenant this request acts for. An explicitly activated tenant
    /// wins over the home tenant.
    pub fn tenant(&self) -> Option<Uuid> {
        self.active_tenant_id.or(self.tenant_id)
    }
}

/// Company id candidates in extraction priority order: route parameter,
/// query parameter, request header, request body. First present wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeCandidate {
    pub path: Option<Uuid>,
    pub query: Option<Uuid>,
    pub header: Option<Uuid>,
    pub body: Option<Uuid>,
}

impl ScopeCandidate {
    pub fn from_path(company_id: Uuid) -> Self {
        Self {
            path: Some(company_id),
            ..Default::default()
        }
    }

    pub fn from_body(company_id: Uuid) -> Self {
        Self {
            body: Some(company_id),
            ..Default::default()
        }
    }

    pub fn first(&self) -> Option<Uuid> {
        self.path.or(self.query).or(self.header).or(self.body)
    }
}

/// Validated `{company, tenant}` pair for the current caller.
///
/// Immutable; fields are only readable. Constructed by the scope guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    company_id: Uuid,
    tenant_id: Uuid,
}

impl Scope {
    pub(crate) fn new(company_id: Uuid, tenant_id: Uuid) -> Self {
        Self {
            company_id,
            tenant_id,
        }
    }

    pub fn company_id(&self) -> Uuid {
        self.company_id
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_priority_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let candidate = ScopeCandidate {
            path: None,
            query: Some(a),
            header: None,
            body: Some(b),
        };
        assert_eq!(candidate.first(), Some(a));
        assert_eq!(ScopeCandidate::default().first(), None);
    }

    #[test]
    fn active_tenant_wins() {
        let home = Uuid::new_v4();
        let active = Uuid::new_v4();
        let identity = Identity {
            user_id: Uuid::new_v4(),
            role: Role::User,
            tenant_id: Some(home),
            active_tenant_id: Some(active),
        };
        assert_eq!(identity.tenant(), Some(active));
    }
}
