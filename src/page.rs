//! Page guards for server-rendered routes.
//!
//! Unlike [`crate::guard`], failures never produce an error status. An
//! unauthenticated visitor is redirected to the login path with a `next`
//! parameter; a principal without the permission, or any failure while
//! deciding, is redirected to the unauthorized path.

use std::future::Future;
use std::sync::Arc;

use tracing::error;

use crate::config::Access;
use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, Rule};
use crate::response::{self, HttpResponse};
use crate::router::{BoxFuture, Context};
use crate::store::{Principal, Store};

/// Result of a page guard check.
#[derive(Debug)]
pub enum Outcome {
    Render(Principal),
    Redirect(String),
}

/// Decide whether the page at `ctx` may render.
pub async fn check<S: Store>(ctx: &Context, evaluator: &Evaluator<S>, rule: &Rule) -> Outcome {
    let access = &ctx.config.access;
    let requested = ctx
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| ctx.path());
    let Ok(principal_id) = ctx.require_session_principal_id() else {
        return Outcome::Redirect(login_location(access, requested));
    };

    match evaluator.authorize(&principal_id, rule, Some(ctx.path())).await {
        Ok(principal) => Outcome::Render(principal),
        Err(Error::PrincipalNotFound(_)) => Outcome::Redirect(login_location(access, requested)),
        Err(Error::Forbidden { .. }) => Outcome::Redirect(access.unauthorized_path.clone()),
        Err(e) => {
            error!("Page guard failed closed for {}: {e}", ctx.path());
            Outcome::Redirect(access.unauthorized_path.clone())
        }
    }
}

fn login_location(access: &Access, next: &str) -> String {
    format!("{}?next={}", access.login_path, urlencoding::encode(next))
}

/// Wrap a page handler so it only renders for principals satisfying `rule`.
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
            match check(&ctx, &evaluator, &rule).await {
                Outcome::Render(principal) => handler(ctx, principal).await,
                Outcome::Redirect(location) => response::redirect(&location),
            }
        })
    }
}
