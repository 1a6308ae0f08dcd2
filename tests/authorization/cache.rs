//! Administrative changes are visible to the very next check.

use std::sync::Arc;

use turnstile::Evaluator;

use super::{principal_with_roles, role, seeded_store, store};

/// Warm the cache with a check, so a stale entry would be observable.
async fn warm(evaluator: &Evaluator<turnstile::db::Store>, id: &str) {
    evaluator.effective_permissions(id).await.unwrap();
}

#[tokio::test]
async fn cached_set_is_reused() {
    let evaluator = Evaluator::new(seeded_store().await);
    principal_with_roles(&evaluator, "u1", &["artist"]).await;

    let first = evaluator.effective_permissions("u1").await.unwrap();
    let second = evaluator.effective_permissions("u1").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn deny_invalidates() {
    let evaluator = Evaluator::new(seeded_store().await);
    principal_with_roles(&evaluator, "u1", &["artist"]).await;
    warm(&evaluator, "u1").await;

    evaluator.deny("u1", "artist:earnings:access").await.unwrap();
    assert!(!evaluator.has_permission("u1", "artist:earnings:access").await.unwrap());
}

#[tokio::test]
async fn grant_and_revoke_invalidate() {
    let evaluator = Evaluator::new(store().await);
    principal_with_roles(&evaluator, "u2", &[]).await;
    warm(&evaluator, "u2").await;

    evaluator.grant("u2", "analytics:requests:read").await.unwrap();
    assert!(evaluator.has_permission("u2", "analytics:requests:read").await.unwrap());

    assert!(evaluator.revoke("u2", "analytics:requests:read").await.unwrap());
    assert!(!evaluator.has_permission("u2", "analytics:requests:read").await.unwrap());

    // Nothing left to revoke
    assert!(!evaluator.revoke("u2", "analytics:requests:read").await.unwrap());
}

#[tokio::test]
async fn revoking_a_denial_restores_the_role_grant() {
    let evaluator = Evaluator::new(seeded_store().await);
    principal_with_roles(&evaluator, "u3", &["roster_admin"]).await;
    evaluator.deny("u3", "content:master_roster:read").await.unwrap();
    assert!(!evaluator.has_permission("u3", "content:master_roster:read").await.unwrap());

    evaluator.revoke("u3", "content:master_roster:read").await.unwrap();
    assert!(evaluator.has_permission("u3", "content:master_roster:read").await.unwrap());
}

#[tokio::test]
async fn role_assignment_invalidates() {
    let evaluator = Evaluator::new(seeded_store().await);
    principal_with_roles(&evaluator, "u4", &[]).await;
    warm(&evaluator, "u4").await;

    evaluator.assign_role("u4", "requests_admin").await.unwrap();
    assert!(evaluator.has_permission("u4", "analytics:requests:read").await.unwrap());

    assert!(evaluator.unassign_role("u4", "requests_admin").await.unwrap());
    assert!(!evaluator.has_permission("u4", "analytics:requests:read").await.unwrap());
}

#[tokio::test]
async fn role_change_reaches_every_holder() {
    let evaluator = Evaluator::new(store().await);
    role(&evaluator, "curator", &["content:asset_library:read"]).await;
    principal_with_roles(&evaluator, "a", &["curator"]).await;
    principal_with_roles(&evaluator, "b", &["curator"]).await;
    warm(&evaluator, "a").await;
    warm(&evaluator, "b").await;

    evaluator
        .set_role_permissions("curator", &["content:master_roster:read"])
        .await
        .unwrap();

    for id in ["a", "b"] {
        assert!(!evaluator.has_permission(id, "content:asset_library:read").await.unwrap());
        assert!(evaluator.has_permission(id, "content:master_roster:read").await.unwrap());
    }
}

#[tokio::test]
async fn fresh_read_bypasses_cache() {
    let evaluator = Evaluator::new(seeded_store().await);
    principal_with_roles(&evaluator, "u5", &[]).await;
    let cached = evaluator.effective_permissions("u5").await.unwrap();

    let fresh = evaluator.effective_permissions_fresh("u5").await.unwrap();
    assert!(!Arc::ptr_eq(&cached, &fresh));
    assert_eq!(cached.sorted(), fresh.sorted());
}
