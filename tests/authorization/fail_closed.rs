//! An unreachable permission store never grants anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use hyper::header::{AUTHORIZATION, HeaderValue};
use turnstile::config::Config;
use turnstile::nav::Entry;
use turnstile::page::{self, Outcome};
use turnstile::store::{Denial, Grants};
use turnstile::{Context, Error, Evaluator, Method, Principal, Result, Rule, Store, auth};

use super::SECRET;

/// Resolves every principal but cannot read grants.
#[derive(Default)]
struct Unreachable {
    denials: AtomicUsize,
}

fn down() -> Error {
    Error::Internal("permission store unreachable".into())
}

impl Store for Unreachable {
    async fn principal(&self, id: &str) -> Result<Option<Principal>> {
        Ok(Some(Principal::new(id).with_role("super_admin")))
    }

    async fn grants(&self, _principal_id: &str) -> Result<Grants> {
        Err(down())
    }

    async fn record_denial(&self, _denial: &Denial) -> Result<()> {
        self.denials.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert_principal(&self, _principal: &Principal) -> Result<()> {
        Err(down())
    }

    async fn upsert_role(&self, _name: &str) -> Result<()> {
        Err(down())
    }

    async fn set_user_permission(&self, _principal_id: &str, _permission: &str, _denied: bool) -> Result<()> {
        Err(down())
    }

    async fn remove_user_permission(&self, _principal_id: &str, _permission: &str) -> Result<bool> {
        Err(down())
    }

    async fn assign_role(&self, _principal_id: &str, _role: &str) -> Result<()> {
        Err(down())
    }

    async fn unassign_role(&self, _principal_id: &str, _role: &str) -> Result<bool> {
        Err(down())
    }

    async fn replace_role_permissions(&self, _role: &str, _permissions: &[String]) -> Result<()> {
        Err(down())
    }
}

fn config() -> Arc<Config> {
    let mut config = Config::default();
    config.auth.jwt_secret = SECRET.to_string();
    Arc::new(config)
}

fn page_context(config: Arc<Config>, principal_id: &str) -> Context {
    let token = auth::create_token(&config.auth, principal_id).unwrap();
    let mut headers = hyper::http::HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    Context {
        method: Method::GET,
        uri: "/admin/finance".parse().unwrap(),
        headers,
        params: HashMap::new(),
        body: Bytes::new(),
        config,
    }
}

#[tokio::test]
async fn check_propagates_store_error() {
    let evaluator = Evaluator::new(Unreachable::default());

    let err = evaluator
        .has_permission("u1", "release:view:own")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    assert!(!err.is_denial());
}

#[tokio::test]
async fn legacy_role_does_not_rescue_a_failed_read() {
    let evaluator = Evaluator::new(Unreachable::default());
    let rule = Rule::permission("finance:wallet_management:read").with_legacy_roles(["super_admin"]);

    assert!(evaluator.decide("u1", &rule).await.is_err());
}

#[tokio::test]
async fn failure_is_not_cached() {
    let evaluator = Evaluator::new(Unreachable::default());

    assert!(evaluator.effective_permissions("u1").await.is_err());
    assert!(evaluator.effective_permissions("u1").await.is_err());
}

#[tokio::test]
async fn store_failure_is_not_audited_as_a_denial() {
    let evaluator = Evaluator::new(Unreachable::default());

    assert!(
        evaluator
            .require_permission("u1", "release:view:own")
            .await
            .is_err()
    );
    assert_eq!(evaluator.store().denials.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn menu_is_empty() {
    let evaluator = Evaluator::new(Unreachable::default());
    let entries = vec![
        Entry::new("Home", "/"),
        Entry::new("Wallets", "/admin/wallets").requires("finance:wallet_management:read"),
    ];

    assert!(evaluator.menu("u1", &entries).await.is_empty());
}

#[tokio::test]
async fn page_redirects_to_unauthorized() {
    let evaluator = Evaluator::new(Unreachable::default());
    let ctx = page_context(config(), "u1");

    let outcome = page::check(&ctx, &evaluator, &Rule::permission("finance:wallet_management:read")).await;
    match outcome {
        Outcome::Redirect(location) => assert_eq!(location, "/unauthorized"),
        Outcome::Render(principal) => panic!("rendered for {}", principal.id),
    }
}

#[tokio::test]
async fn admin_changes_surface_the_error() {
    let evaluator = Evaluator::new(Unreachable::default());

    assert!(evaluator.grant("u1", "release:view:own").await.is_err());
    assert!(
        evaluator
            .set_role_permissions("artist", &["release:view:own"])
            .await
            .is_err()
    );
}
