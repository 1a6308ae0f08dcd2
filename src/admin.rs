//! Administrative changes to roles and per-user overrides.
//!
//! Every change is written to the store and then invalidates the affected
//! cache entries before returning, so the next check sees it.

use tracing::info;

use crate::defaults;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::permission::Permission;
use crate::store::{Principal, Store};

impl<S: Store> Evaluator<S> {
    fn invalidate(&self, principal_id: &str) {
        if let Some(cache) = self.cache() {
            cache.invalidate(principal_id);
        }
    }

    fn invalidate_all(&self) {
        if let Some(cache) = self.cache() {
            cache.clear();
        }
    }

    /// Create or update a principal as resolved by the identity provider.
    pub async fn register_principal(&self, principal: &Principal) -> Result<()> {
        self.store().upsert_principal(principal).await?;
        self.invalidate(&principal.id);
        Ok(())
    }

    /// Directly grant a permission to a principal.
    pub async fn grant(&self, principal_id: &str, permission: &str) -> Result<()> {
        self.set_override(principal_id, permission, false).await
    }

    /// Deny a permission to a principal, overriding any role grant.
    pub async fn deny(&self, principal_id: &str, permission: &str) -> Result<()> {
        self.set_override(principal_id, permission, true).await
    }

    async fn set_override(&self, principal_id: &str, permission: &str, denied: bool) -> Result<()> {
        let permission = Permission::parse(permission)?;
        self.principal(principal_id).await?;
        self.store()
            .set_user_permission(principal_id, permission.as_str(), denied)
            .await?;
        self.invalidate(principal_id);
        info!(
            "{} {} for {}",
            if denied { "Denied" } else { "Granted" },
            permission,
            principal_id
        );
        Ok(())
    }

    /// Remove a direct grant or denial. Returns whether one existed.
    pub async fn revoke(&self, principal_id: &str, permission: &str) -> Result<bool> {
        let permission = Permission::parse(permission)?;
        let removed = self
            .store()
            .remove_user_permission(principal_id, permission.as_str())
            .await?;
        self.invalidate(principal_id);
        if removed {
            info!("Revoked override {} for {}", permission, principal_id);
        }
        Ok(removed)
    }

    pub async fn assign_role(&self, principal_id: &str, role: &str) -> Result<()> {
        self.principal(principal_id).await?;
        self.store().assign_role(principal_id, role).await?;
        self.invalidate(principal_id);
        info!("Assigned role {} to {}", role, principal_id);
        Ok(())
    }

    pub async fn unassign_role(&self, principal_id: &str, role: &str) -> Result<bool> {
        let removed = self.store().unassign_role(principal_id, role).await?;
        self.invalidate(principal_id);
        if removed {
            info!("Unassigned role {} from {}", role, principal_id);
        }
        Ok(removed)
    }

    /// Replace a role's permission list. Affects every holder of the role.
    pub async fn set_role_permissions(&self, role: &str, permissions: &[&str]) -> Result<()> {
        let names = permissions
            .iter()
            .map(|p| Permission::parse(p).map(|p| p.to_string()))
            .collect::<Result<Vec<_>>>()?;
        self.store().replace_role_permissions(role, &names).await?;
        self.invalidate_all();
        info!("Set {} permissions on role {}", names.len(), role);
        Ok(())
    }

    /// Restore a role to its default permission list.
    pub async fn reset_role_to_default(&self, role: &str) -> Result<()> {
        let permissions = defaults::for_role(role)
            .ok_or_else(|| Error::NotFound(format!("default permissions for role {role}")))?;
        self.store().upsert_role(role).await?;
        self.set_role_permissions(role, permissions).await
    }
}
