//! Access-management API.
//!
//! Routes for inspecting effective permissions and managing per-user
//! overrides and role assignments. Every route is itself guarded.
//!
//! | Route | Permission |
//! |---|---|
//! | `GET /api/me/permissions` | any authenticated principal |
//! | `GET /api/users/{id}/permissions` | [`READ`] |
//! | `PUT /api/users/{id}/permissions` | [`UPDATE`] |
//! | `DELETE /api/users/{id}/permissions/{permission}` | [`UPDATE`] |
//! | `PUT /api/users/{id}/roles/{role}` | [`UPDATE`] |
//! | `DELETE /api/users/{id}/roles/{role}` | [`UPDATE`] |
//! | `POST /api/roles/{role}/reset-default` | [`UPDATE`] |

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, Rule};
use crate::guard;
use crate::response::{self, HttpResponse};
use crate::router::Router;
use crate::store::Store;

pub const READ: &str = "users_access:permissions_roles:read";
pub const UPDATE: &str = "users_access:permissions_roles:update";

#[derive(Debug, Deserialize)]
struct OverrideRequest {
    permission: String,
    #[serde(default)]
    denied: bool,
}

/// The target of an admin call is a resource, so an unknown id is a 404.
fn target(e: Error) -> Error {
    match e {
        Error::PrincipalNotFound(id) => Error::NotFound(format!("principal {id}")),
        other => other,
    }
}

async fn permissions_body<S: Store>(evaluator: &Evaluator<S>, principal_id: &str) -> Result<HttpResponse> {
    let permissions = evaluator
        .effective_permissions_fresh(principal_id)
        .await
        .map_err(target)?;
    response::ok(&json!({
        "principal": principal_id,
        "permissions": permissions.sorted(),
    }))
}

pub struct Module<S> {
    evaluator: Arc<Evaluator<S>>,
}

impl<S: Store> Module<S> {
    pub fn new(evaluator: Arc<Evaluator<S>>) -> Self {
        Self { evaluator }
    }
}

impl<S: Store> crate::module::Module for Module<S> {
    fn name(&self) -> &'static str {
        "access"
    }

    fn routes(&self, router: &mut Router) {
        let ev = &self.evaluator;

        let evaluator = Arc::clone(ev);
        router.get(
            "/api/me/permissions",
            guard::route(Arc::clone(ev), Rule::authenticated(), move |_ctx, principal| {
                let evaluator = Arc::clone(&evaluator);
                async move {
                    let permissions = evaluator.effective_permissions(&principal.id).await?;
                    response::ok(&json!({
                        "principal": principal.id,
                        "role": principal.role,
                        "permissions": permissions.sorted(),
                    }))
                }
            }),
        );

        let evaluator = Arc::clone(ev);
        router.get(
            "/api/users/{id}/permissions",
            guard::route(Arc::clone(ev), Rule::permission(READ), move |ctx, _principal| {
                let evaluator = Arc::clone(&evaluator);
                async move {
                    let id = ctx.require_param("id")?;
                    permissions_body(&evaluator, id).await
                }
            }),
        );

        let evaluator = Arc::clone(ev);
        router.put(
            "/api/users/{id}/permissions",
            guard::route(Arc::clone(ev), Rule::permission(UPDATE), move |ctx, _principal| {
                let evaluator = Arc::clone(&evaluator);
                async move {
                    let id = ctx.require_param("id")?;
                    let request: OverrideRequest = ctx.json()?;
                    let result = if request.denied {
                        evaluator.deny(id, &request.permission).await
                    } else {
                        evaluator.grant(id, &request.permission).await
                    };
                    result.map_err(|e| match e {
                        // A bad name in a request body is the client's mistake
                        Error::MalformedPermission(name) => {
                            Error::BadRequest(format!("Malformed permission: {name:?}"))
                        }
                        other => target(other),
                    })?;
                    permissions_body(&evaluator, id).await
                }
            }),
        );

        let evaluator = Arc::clone(ev);
        router.delete(
            "/api/users/{id}/permissions/{permission}",
            guard::route(Arc::clone(ev), Rule::permission(UPDATE), move |ctx, _principal| {
                let evaluator = Arc::clone(&evaluator);
                async move {
                    let id = ctx.require_param("id")?;
                    let permission = ctx.require_param("permission")?;
                    let removed = evaluator
                        .revoke(id, permission)
                        .await
                        .map_err(|e| match e {
                            Error::MalformedPermission(name) => {
                                Error::BadRequest(format!("Malformed permission: {name:?}"))
                            }
                            other => other,
                        })?;
                    if !removed {
                        return Err(Error::NotFound(format!("override {permission} for {id}")));
                    }
                    Ok(response::no_content())
                }
            }),
        );

        let evaluator = Arc::clone(ev);
        router.put(
            "/api/users/{id}/roles/{role}",
            guard::route(Arc::clone(ev), Rule::permission(UPDATE), move |ctx, _principal| {
                let evaluator = Arc::clone(&evaluator);
                async move {
                    let id = ctx.require_param("id")?;
                    let role = ctx.require_param("role")?;
                    evaluator.assign_role(id, role).await.map_err(target)?;
                    Ok(response::no_content())
                }
            }),
        );

        let evaluator = Arc::clone(ev);
        router.delete(
            "/api/users/{id}/roles/{role}",
            guard::route(Arc::clone(ev), Rule::permission(UPDATE), move |ctx, _principal| {
                let evaluator = Arc::clone(&evaluator);
                async move {
                    let id = ctx.require_param("id")?;
                    let role = ctx.require_param("role")?;
                    if !evaluator.unassign_role(id, role).await? {
                        return Err(Error::NotFound(format!("role {role} on {id}")));
                    }
                    Ok(response::no_content())
                }
            }),
        );

        let evaluator = Arc::clone(ev);
        router.post(
            "/api/roles/{role}/reset-default",
            guard::route(Arc::clone(ev), Rule::permission(UPDATE), move |ctx, _principal| {
                let evaluator = Arc::clone(&evaluator);
                async move {
                    let role = ctx.require_param("role")?;
                    evaluator.reset_role_to_default(role).await?;
                    Ok(response::no_content())
                }
            }),
        );
    }
}
