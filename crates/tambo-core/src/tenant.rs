//! # Tenant Scope
//!
//! Every row in Tambo belongs to a company (empresa) and most rows to one of
//! its branches (sede). Instead of relying on implicit global filters, the
//! scope is an explicit value that each repository is built from.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  JWT claims { company_id, branch_id }                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  TenantScope ──► db.scoped(&scope).sales() ──► WHERE company_id = ?1    │
//! │                                                 AND branch_id = ?2      │
//! │                                                                         │
//! │  A row from another tenant is indistinguishable from a missing row.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The company/branch pair a request acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenantScope {
    pub company_id: String,
    pub branch_id: String,
}

impl TenantScope {
    pub fn new(company_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        TenantScope {
            company_id: company_id.into(),
            branch_id: branch_id.into(),
        }
    }

    /// Same company, different branch.
    pub fn with_branch(&self, branch_id: impl Into<String>) -> Self {
        TenantScope {
            company_id: self.company_id.clone(),
            branch_id: branch_id.into(),
        }
    }
}
