//! Permission store interface.
//!
//! The evaluator reads role and user permission rows through [`Store`] and
//! administrative actions write through it. [`crate::db::Store`] is the
//! libsql implementation.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::permission::Mode;

/// An identified user being authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Legacy single role name, kept for older role-equality checks.
    #[serde(default)]
    pub role: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A direct per-user grant (`denied = false`) or denial (`denied = true`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    pub name: String,
    pub denied: bool,
}

/// Everything needed to compute one principal's effective set.
#[derive(Debug, Clone, Default)]
pub struct Grants {
    /// Names of the roles assigned to the principal.
    pub roles: Vec<String>,
    /// Permission names granted through those roles (may repeat).
    pub role_permissions: Vec<String>,
    pub user_permissions: Vec<UserPermission>,
}

/// A denied authorization, recorded for audit.
#[derive(Debug, Clone, Serialize)]
pub struct Denial {
    pub principal_id: String,
    pub role: Option<String>,
    pub required: Vec<String>,
    pub mode: Mode,
    pub path: Option<String>,
}

/// Backing store for roles, permissions and their assignments.
pub trait Store: Send + Sync + 'static {
    /// Look up a principal. `Ok(None)` when the id does not resolve.
    fn principal(&self, id: &str) -> impl Future<Output = Result<Option<Principal>>> + Send;

    /// Role assignments, role permissions and user permission rows for a principal.
    fn grants(&self, principal_id: &str) -> impl Future<Output = Result<Grants>> + Send;

    fn record_denial(&self, denial: &Denial) -> impl Future<Output = Result<()>> + Send;

    /// Insert or update a principal row.
    fn upsert_principal(&self, principal: &Principal) -> impl Future<Output = Result<()>> + Send;

    /// Create a role if it does not exist yet.
    fn upsert_role(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Insert or update a user permission row, creating the permission if needed.
    fn set_user_permission(
        &self,
        principal_id: &str,
        permission: &str,
        denied: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a user permission row. Returns whether a row was removed.
    fn remove_user_permission(
        &self,
        principal_id: &str,
        permission: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Assign an existing role. Fails with `NotFound` for an unknown role.
    fn assign_role(&self, principal_id: &str, role: &str) -> impl Future<Output = Result<()>> + Send;

    fn unassign_role(&self, principal_id: &str, role: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Replace a role's permission list, creating missing permissions.
    fn replace_role_permissions(
        &self,
        role: &str,
        permissions: &[String],
    ) -> impl Future<Output = Result<()>> + Send;
}
