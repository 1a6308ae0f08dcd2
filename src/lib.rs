//! Turnstile - permission evaluation for a role-based music distribution platform.
//!
//! Every access decision in the platform is answered from one effective
//! permission set per principal:
//!
//! - **Permission**: `resource:action:scope` names, requirements and sets
//! - **Evaluator**: effective-set computation, rules, decisions and denials
//! - **Cache**: per-principal effective sets with synchronous invalidation
//! - **Admin**: grants, denials, role assignment and role defaults
//! - **Guard / Page**: API route guards (401/403) and page guards (redirects)
//! - **Nav**: navigation menu filtering
//! - **Access**: HTTP module for managing permissions
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use turnstile::{Evaluator, Loader, Module, Router, Rule, access, config, db, guard};
//!
//! #[tokio::main]
//! async fn main() -> turnstile::Result<()> {
//!     let config = Loader::new("TURNSTILE").load(None, &config::Overrides::default())?;
//!
//!     let store = db::Store::open(&config.database.url).await?;
//!     turnstile::defaults::seed(&store).await?;
//!     let evaluator = Arc::new(Evaluator::with_config(store, &config.access));
//!
//!     let mut router = Router::new();
//!     access::Module::new(Arc::clone(&evaluator)).routes(&mut router);
//!     router.get(
//!         "/api/analytics",
//!         guard::route(evaluator, Rule::permission("analytics:platform_analytics:read"), |_ctx, _principal| async move {
//!             turnstile::response::ok(&turnstile::json!({ "streams": 0 }))
//!         }),
//!     );
//!
//!     turnstile::server::run(config, router.into_handle()).await
//! }
//! ```

pub mod access;
pub mod admin;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod defaults;
pub mod error;
pub mod evaluator;
pub mod guard;
pub mod module;
pub mod nav;
pub mod page;
pub mod permission;
pub mod response;
pub mod router;
pub mod server;
pub mod store;

// Re-export main types at crate root
pub use config::{Config, Loader};
pub use error::{Error, Result};
pub use evaluator::{Decision, Evaluator, Rule};
pub use module::Module;
pub use permission::{Mode, Permission, Permissions, Required, WILDCARD};
pub use router::{Context, Router};
pub use store::{Principal, Store};

// Re-export commonly used dependencies for convenience
pub use hyper::Method;
pub use serde_json::json;
