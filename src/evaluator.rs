//! Permission evaluation.
//!
//! A principal's effective set is the union of the permissions of every
//! assigned role and every non-denied user permission, minus every
//! permission named by a denied user permission. Denials always win. The
//! `*:*:*` token in the effective set satisfies any requirement.
//!
//! Every route guard, page guard and menu filter goes through
//! [`Evaluator`]; none of them read the permission tables directly.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::cache::Cache;
use crate::config::Access;
use crate::error::{Error, Result};
use crate::permission::{Mode, Permissions, Required};
use crate::store::{Denial, Grants, Principal, Store};

/// Compute an effective permission set from raw grant rows.
pub fn effective(grants: &Grants) -> Permissions {
    let denied: HashSet<&str> = grants
        .user_permissions
        .iter()
        .filter(|up| up.denied)
        .map(|up| up.name.as_str())
        .collect();

    let granted = grants
        .user_permissions
        .iter()
        .filter(|up| !up.denied)
        .map(|up| up.name.as_str());

    grants
        .role_permissions
        .iter()
        .map(String::as_str)
        .chain(granted)
        .filter(|name| !denied.contains(name))
        .collect()
}

/// What a guard demands of a principal.
///
/// A rule with a [`Required`] is decided by the permission set. Legacy role
/// names are only consulted on their own when no permission is given; when
/// both are present the permission decision stands and a disagreement is
/// logged. A rule with neither only requires an existing principal.
#[derive(Debug, Clone, Default)]
pub struct Rule {
    required: Option<Required>,
    roles: Vec<String>,
}

impl Rule {
    /// Any existing principal.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn permission(required: impl Into<Required>) -> Self {
        Self {
            required: Some(required.into()),
            roles: Vec::new(),
        }
    }

    /// Deprecated role-name equality check against the principal's legacy `role`.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: None,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach legacy role names to a permission rule, for mismatch reporting.
    pub fn with_legacy_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(&self) -> Option<&Required> {
        self.required.as_ref()
    }

    pub fn legacy_roles(&self) -> &[String] {
        &self.roles
    }

    /// Requirement names and mode as reported in errors and audit rows.
    fn describe(&self) -> (Vec<String>, Mode) {
        match &self.required {
            Some(required) => (required.names().to_vec(), required.mode()),
            None => (
                self.roles.iter().map(|r| format!("role:{r}")).collect(),
                Mode::Any,
            ),
        }
    }

    fn forbidden(&self) -> Error {
        let (required, mode) = self.describe();
        Error::Forbidden { required, mode }
    }
}

/// Outcome of evaluating a [`Rule`].
#[derive(Debug, Clone)]
pub struct Decision {
    pub principal: Principal,
    pub granted: bool,
}

/// Answers "does this principal hold this permission".
pub struct Evaluator<S> {
    store: S,
    cache: Option<Cache>,
    audit: bool,
}

impl<S: Store> Evaluator<S> {
    /// Evaluator with caching and denial auditing enabled.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: Some(Cache::new()),
            audit: true,
        }
    }

    pub fn with_config(store: S, access: &Access) -> Self {
        Self {
            store,
            cache: access
                .cache_permissions
                .then(|| Cache::with_capacity(access.cache_capacity)),
            audit: access.audit_denials,
        }
    }

    /// Evaluator that reads the store on every check.
    pub fn uncached(store: S) -> Self {
        Self {
            store,
            cache: None,
            audit: true,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn cache(&self) -> Option<&Cache> {
        self.cache.as_ref()
    }

    /// Resolve a principal id, failing with [`Error::PrincipalNotFound`].
    pub async fn principal(&self, principal_id: &str) -> Result<Principal> {
        self.store
            .principal(principal_id)
            .await?
            .ok_or_else(|| Error::PrincipalNotFound(principal_id.to_string()))
    }

    /// The principal's effective permission set, served from cache when enabled.
    pub async fn effective_permissions(&self, principal_id: &str) -> Result<Arc<Permissions>> {
        let principal = self.principal(principal_id).await?;
        self.load(&principal, false).await
    }

    /// Like [`effective_permissions`](Self::effective_permissions) but always
    /// reads the store, refreshing the cached entry.
    pub async fn effective_permissions_fresh(&self, principal_id: &str) -> Result<Arc<Permissions>> {
        let principal = self.principal(principal_id).await?;
        self.load(&principal, true).await
    }

    async fn load(&self, principal: &Principal, fresh: bool) -> Result<Arc<Permissions>> {
        if !fresh
            && let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&principal.id))
        {
            return Ok(cached);
        }

        let generation = self.cache.as_ref().map(Cache::generation);
        let grants = self.store.grants(&principal.id).await.inspect_err(|e| {
            error!("Permission store unavailable for {}: {e}", principal.id);
        })?;
        let permissions = Arc::new(effective(&grants));

        warn_on_legacy_mismatch(principal, &grants, &permissions);

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            cache.insert(&principal.id, Arc::clone(&permissions), generation);
        }
        Ok(permissions)
    }

    /// Whether the principal satisfies `required`.
    ///
    /// Returns `Ok(false)` for "not authorized". Errors for an unknown
    /// principal, a malformed requirement, or a store failure.
    pub async fn has_permission(&self, principal_id: &str, required: impl Into<Required>) -> Result<bool> {
        let rule = Rule::permission(required);
        Ok(self.decide(principal_id, &rule).await?.granted)
    }

    /// Fails with [`Error::Forbidden`] when the principal lacks `required`.
    pub async fn require_permission(&self, principal_id: &str, required: impl Into<Required>) -> Result<()> {
        let rule = Rule::permission(required);
        self.authorize(principal_id, &rule, None).await.map(|_| ())
    }

    /// Deprecated: string equality against the principal's legacy `role`.
    pub async fn has_role(&self, principal_id: &str, roles: &[&str]) -> Result<bool> {
        let principal = self.principal(principal_id).await?;
        Ok(legacy_match(&principal, roles.iter().copied()))
    }

    /// Evaluate a rule without side effects.
    pub async fn decide(&self, principal_id: &str, rule: &Rule) -> Result<Decision> {
        // Malformed requirements fail before touching the store
        if let Some(required) = rule.required() {
            required.validate()?;
        }

        let principal = self.principal(principal_id).await?;
        let legacy = (!rule.roles.is_empty())
            .then(|| legacy_match(&principal, rule.roles.iter().map(String::as_str)));

        let granted = match (rule.required(), legacy) {
            (Some(required), legacy) => {
                let permissions = self.load(&principal, false).await?;
                let granted = permissions.satisfies(required)?;
                if let Some(legacy) = legacy
                    && legacy != granted
                {
                    warn!(
                        "Legacy role check for {} ({:?}) disagrees with permissions on {}: role says {}, permissions say {}",
                        principal.id, principal.role, required, legacy, granted
                    );
                }
                granted
            }
            (None, Some(legacy)) => {
                debug!("Deprecated role check for {}: {:?}", principal.id, rule.roles);
                legacy
            }
            (None, None) => true,
        };

        debug!(
            "Authorization for {} -> {}",
            principal.id,
            if granted { "granted" } else { "denied" }
        );
        Ok(Decision { principal, granted })
    }

    /// Evaluate a rule, auditing and failing with [`Error::Forbidden`] on denial.
    ///
    /// `path` is the request path recorded with the denial, if any.
    pub async fn authorize(&self, principal_id: &str, rule: &Rule, path: Option<&str>) -> Result<Principal> {
        let decision = self.decide(principal_id, rule).await?;
        if decision.granted {
            return Ok(decision.principal);
        }

        let (required, mode) = rule.describe();
        warn!(
            "Permission denied for {} on {:?}: requires {} of {:?}",
            decision.principal.id,
            path.unwrap_or("-"),
            mode.as_str(),
            required
        );
        self.record_denial(Denial {
            principal_id: decision.principal.id,
            role: decision.principal.role,
            required,
            mode,
            path: path.map(str::to_string),
        })
        .await;
        Err(rule.forbidden())
    }

    /// Write an audit row. Failures are logged and never change the decision.
    pub async fn record_denial(&self, denial: Denial) {
        if !self.audit {
            return;
        }
        if let Err(e) = self.store.record_denial(&denial).await {
            error!("Failed to record permission denial for {}: {e}", denial.principal_id);
        }
    }
}

fn legacy_match<'a>(principal: &Principal, mut roles: impl Iterator<Item = &'a str>) -> bool {
    match principal.role.as_deref() {
        Some(role) => roles.any(|r| r == role),
        None => false,
    }
}

fn warn_on_legacy_mismatch(principal: &Principal, grants: &Grants, permissions: &Permissions) {
    let Some(role) = principal.role.as_deref() else {
        return;
    };
    if !grants.roles.iter().any(|r| r == role) {
        warn!(
            "Principal {} has legacy role {role} but is assigned {:?}; using permission rows",
            principal.id, grants.roles
        );
    }
    if permissions.is_empty() {
        warn!(
            "Principal {} has legacy role {role} but no effective permissions",
            principal.id
        );
    }
}
