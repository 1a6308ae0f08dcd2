//! Module trait for pluggable API modules.
//!
//! Modules implement the `Module` trait to register their routes with the
//! server. [`crate::access::Module`] is the access-management module.

use crate::router::Router;

/// A pluggable API module.
///
/// State is captured in the route closures, typically an `Arc` of the
/// evaluator.
pub trait Module: Send + Sync {
    /// Module name for identification and logging.
    fn name(&self) -> &'static str;

    /// Register routes with the router.
    fn routes(&self, router: &mut Router);
}
