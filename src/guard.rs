//! Route guards for API handlers.
//!
//! A guarded handler resolves the calling principal from the bearer token,
//! asks the evaluator to authorize the route's [`Rule`], and only then runs,
//! receiving the resolved [`Principal`] as an explicit argument.
//!
//! - no or invalid token, or an unknown principal: 401 `{ "error": ... }`
//! - principal lacks the permission: 403 `{ "error": ... }`
//!
//! # Example
//!
//! ```ignore
//! router.delete(
//!     "/api/releases/{id}",
//!     guard::route(
//!         Arc::clone(&evaluator),
//!         Rule::permission(["release:delete:own", "release:delete:label"]),
//!         |ctx, principal| async move { delete_release(ctx, principal).await },
//!     ),
//! );
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::Result;
use crate::evaluator::{Evaluator, Rule};
use crate::response::HttpResponse;
use crate::router::{BoxFuture, Context};
use crate::store::{Principal, Store};

/// Authorize the request in `ctx` against `rule`.
pub async fn authorize<S: Store>(ctx: &Context, evaluator: &Evaluator<S>, rule: &Rule) -> Result<Principal> {
    let principal_id = ctx.require_principal_id()?;
    evaluator
        .authorize(&principal_id, rule, Some(ctx.path()))
        .await
}

/// Wrap `handler` so it only runs for principals satisfying `rule`.
pub fn route<S, F, Fut>(
    evaluator: Arc<Evaluator<S>>,
    rule: Rule,
    handler: F,
) -> impl Fn(Context) -> BoxFuture<'static, Result<HttpResponse>> + Send + Sync + 'static
where
    S: Store,
    F: Fn(Context, Principal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    let handler = Arc::new(handler);
    let rule = Arc::new(rule);
    move |ctx: Context| -> BoxFuture<'static, Result<HttpResponse>> {
        let evaluator = Arc::clone(&evaluator);
        let rule = Arc::clone(&rule);
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let principal = authorize(&ctx, &evaluator, &rule).await?;
            handler(ctx, principal).await
        })
    }
}
