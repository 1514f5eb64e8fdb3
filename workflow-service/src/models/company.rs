//! Company model for workflow-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A company record: either the tenant's own selling entity or a customer
/// account the tenant sells to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a company.
#[derive(Debug, Clone)]
pub struct CreateCompany {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
}

/// Frozen copy of company details stamped onto an invoice at creation,
/// so historical invoices stay stable when the company record changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySnapshot {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
}

impl From<&Company> for CompanySnapshot {
    fn from(company: &Company) -> Self {
        Self {
            name: company.name.clone(),
            email: company.email.clone(),
            address: company.address.clone(),
            tax_id: company.tax_id.clone(),
        }
    }
}
