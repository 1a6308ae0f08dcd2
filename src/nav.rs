//! Navigation menu filtering.
//!
//! A menu is filtered with one effective-set computation followed by a
//! membership test per entry, never one store read per entry.

use serde::Serialize;
use tracing::error;

use crate::Result;
use crate::evaluator::Evaluator;
use crate::permission::{Permissions, Required};
use crate::store::Store;

/// A menu entry, optionally gated by a permission requirement.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub label: String,
    pub href: String,
    #[serde(skip)]
    pub required: Option<Required>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Entry>,
}

impl Entry {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            required: None,
            children: Vec::new(),
        }
    }

    pub fn requires(mut self, required: impl Into<Required>) -> Self {
        self.required = Some(required.into());
        self
    }

    pub fn child(mut self, entry: Entry) -> Self {
        self.children.push(entry);
        self
    }
}

/// Keep the entries `permissions` satisfies.
///
/// Children are filtered recursively; a group whose children are all hidden
/// is dropped. Malformed requirements fail the whole menu.
pub fn filter(entries: &[Entry], permissions: &Permissions) -> Result<Vec<Entry>> {
    let mut visible = Vec::new();
    for entry in entries {
        if let Some(required) = &entry.required
            && !permissions.satisfies(required)?
        {
            continue;
        }
        let children = filter(&entry.children, permissions)?;
        if !entry.children.is_empty() && children.is_empty() {
            continue;
        }
        visible.push(Entry {
            children,
            ..entry.clone()
        });
    }
    Ok(visible)
}

impl<S: Store> Evaluator<S> {
    /// The subset of `entries` visible to a principal.
    ///
    /// Fails closed: any error while computing permissions yields an empty menu.
    pub async fn menu(&self, principal_id: &str, entries: &[Entry]) -> Vec<Entry> {
        let filtered = match self.effective_permissions(principal_id).await {
            Ok(permissions) => filter(entries, &permissions),
            Err(e) => Err(e),
        };
        filtered.unwrap_or_else(|e| {
            error!("Menu for {principal_id} failed closed: {e}");
            Vec::new()
        })
    }
}
