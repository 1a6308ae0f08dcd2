//! Default role permissions.
//!
//! These are the lists a role is restored to by "reset to default" and the
//! data [`seed`] provisions into an empty store.

use tracing::info;

use crate::Result;
use crate::permission::{Permission, WILDCARD};
use crate::store::Store;

/// Role name and its default permission names.
pub const ROLES: &[(&str, &[&str])] = &[
    (
        "artist",
        &[
            "artist:dashboard:access",
            "artist:release:access",
            "artist:analytics:access",
            "artist:earnings:access",
            "artist:roster:access",
            "artist:messages:access",
            "artist:settings:access",
            "artist:platform:access",
        ],
    ),
    (
        "label_admin",
        &[
            "labeladmin:dashboard:access",
            "labeladmin:releases:access",
            "labeladmin:analytics:access",
            "labeladmin:earnings:access",
            "labeladmin:roster:access",
            "labeladmin:artists:access",
            "labeladmin:messages:access",
            "labeladmin:settings:access",
            "labeladmin:profile:access",
        ],
    ),
    ("super_admin", &[WILDCARD]),
    (
        "company_admin",
        &[
            "users_access:user_management:read",
            "users_access:permissions_roles:read",
            "analytics:requests:read",
            "analytics:platform_analytics:read",
            "analytics:analytics_management:read",
            "finance:earnings_management:read",
            "finance:wallet_management:read",
            "finance:split_configuration:read",
            "content:asset_library:read",
            "content:master_roster:read",
            "dropdown:platform_messages:read",
        ],
    ),
    (
        "analytics_admin",
        &[
            "analytics:requests:read",
            "analytics:platform_analytics:read",
            "analytics:analytics_management:read",
        ],
    ),
    (
        "financial_admin",
        &[
            "finance:earnings_management:read",
            "finance:wallet_management:read",
            "finance:split_configuration:read",
        ],
    ),
    (
        "content_moderator",
        &["content:asset_library:read", "content:master_roster:read"],
    ),
    ("roster_admin", &["content:master_roster:read"]),
    ("requests_admin", &["analytics:requests:read"]),
    (
        "marketing_admin",
        &["analytics:platform_analytics:read", "content:asset_library:read"],
    ),
    (
        "support_admin",
        &[
            "users_access:user_management:read",
            "analytics:requests:read",
            "dropdown:platform_messages:read",
        ],
    ),
    ("distribution_partner", &["distribution:read:partner"]),
    ("custom_admin", &[]),
    ("test_admin", &[]),
];

/// Default permissions for a role, or `None` for a role without defaults.
pub fn for_role(role: &str) -> Option<&'static [&'static str]> {
    ROLES
        .iter()
        .find(|(name, _)| *name == role)
        .map(|(_, permissions)| *permissions)
}

/// Provision every default role with its default permission list.
///
/// Idempotent: existing roles are reset to their defaults.
pub async fn seed<S: Store>(store: &S) -> Result<()> {
    for (role, permissions) in ROLES {
        let names = permissions
            .iter()
            .map(|p| Permission::parse(p).map(|p| p.to_string()))
            .collect::<Result<Vec<_>>>()?;
        store.upsert_role(role).await?;
        store.replace_role_permissions(role, &names).await?;
    }
    info!("Seeded {} default roles", ROLES.len());
    Ok(())
}
