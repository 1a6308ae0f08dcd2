//! Permission strings and effective permission sets.
//!
//! A permission is a `resource:action:scope` token such as
//! `release:delete:own` or `analytics:view:label`. Matching is exact,
//! case-sensitive string equality. The only wildcard is the literal
//! [`WILDCARD`] token `*:*:*`, which satisfies every check; a token like
//! `release:*:own` is just another name and matches nothing but itself.
//!
//! # Example
//!
//! ```ignore
//! use turnstile::permission::{Permissions, Required};
//!
//! let held = Permissions::from_iter(["release:delete:label"]);
//! let required = Required::any(["release:delete:own", "release:delete:label"]);
//! assert!(held.satisfies(&required)?);
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The universal superuser permission.
pub const WILDCARD: &str = "*:*:*";

/// A validated `resource:action:scope` permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    name: String,
    action_at: usize,
    scope_at: usize,
}

impl Permission {
    /// Parse a permission string.
    ///
    /// Fails with [`Error::MalformedPermission`] unless the string has exactly
    /// three non-empty `:`-separated segments.
    pub fn parse(name: &str) -> Result<Self> {
        let malformed = || Error::MalformedPermission(name.to_string());

        let mut segments = name.split(':');
        let resource = segments.next().ok_or_else(malformed)?;
        let action = segments.next().ok_or_else(malformed)?;
        let scope = segments.next().ok_or_else(malformed)?;
        if segments.next().is_some() {
            return Err(malformed());
        }
        if [resource, action, scope].iter().any(|s| s.trim().is_empty()) {
            return Err(malformed());
        }

        Ok(Self {
            name: name.to_string(),
            action_at: resource.len() + 1,
            scope_at: resource.len() + action.len() + 2,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn resource(&self) -> &str {
        &self.name[..self.action_at - 1]
    }

    pub fn action(&self) -> &str {
        &self.name[self.action_at..self.scope_at - 1]
    }

    pub fn scope(&self) -> Scope {
        Scope::from(&self.name[self.scope_at..])
    }

    /// True only for the literal `*:*:*` token.
    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Applicability qualifier of a permission.
///
/// Informational: scopes never widen matching. Holding `release:delete:any`
/// does not satisfy a check for `release:delete:own`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Only the caller's own resources.
    Own,
    /// Every resource regardless of owner.
    Any,
    /// Resources within the caller's label hierarchy.
    Label,
    Other(String),
}

impl From<&str> for Scope {
    fn from(s: &str) -> Self {
        match s {
            "own" => Scope::Own,
            "any" => Scope::Any,
            "label" => Scope::Label,
            other => Scope::Other(other.to_string()),
        }
    }
}

/// How a list of required permissions combines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// At least one listed permission must be held.
    #[default]
    Any,
    /// Every listed permission must be held.
    All,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Any => "any",
            Mode::All => "all",
        }
    }
}

/// A permission requirement: one name, or a list of names combined by [`Mode`].
///
/// Names are kept as given and validated when the requirement is evaluated,
/// so a bad name surfaces as [`Error::MalformedPermission`] at the check site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Required {
    names: Vec<String>,
    mode: Mode,
}

impl Required {
    /// Alternatives: any one match is sufficient.
    pub fn any<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            mode: Mode::Any,
        }
    }

    /// Conjunction: every name must match.
    pub fn all<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            mode: Mode::All,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Check every name against the grammar.
    pub fn validate(&self) -> Result<()> {
        if self.names.is_empty() {
            return Err(Error::MalformedPermission(String::new()));
        }
        for name in &self.names {
            Permission::parse(name)?;
        }
        Ok(())
    }

    /// The error reported when this requirement is not met.
    pub fn forbidden(&self) -> Error {
        Error::Forbidden {
            required: self.names.clone(),
            mode: self.mode,
        }
    }
}

impl From<&str> for Required {
    fn from(name: &str) -> Self {
        Required::any([name])
    }
}

impl From<String> for Required {
    fn from(name: String) -> Self {
        Required::any([name])
    }
}

impl From<&[&str]> for Required {
    fn from(names: &[&str]) -> Self {
        Required::any(names.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Required {
    fn from(names: [&str; N]) -> Self {
        Required::any(names)
    }
}

impl From<Vec<&str>> for Required {
    fn from(names: Vec<&str>) -> Self {
        Required::any(names)
    }
}

impl From<Vec<String>> for Required {
    fn from(names: Vec<String>) -> Self {
        Required::any(names)
    }
}

impl fmt::Display for Required {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = match self.mode {
            Mode::Any => " OR ",
            Mode::All => " AND ",
        };
        f.write_str(&self.names.join(sep))
    }
}

/// A principal's effective permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(HashSet<String>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Whether the set holds the `*:*:*` token.
    pub fn is_superuser(&self) -> bool {
        self.0.contains(WILDCARD)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Names in lexical order, for stable output.
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iter().collect();
        names.sort_unstable();
        names
    }

    /// Decide a requirement against this set.
    ///
    /// Returns `Ok(false)` for "not authorized"; errors only when the
    /// requirement itself is malformed.
    pub fn satisfies(&self, required: &Required) -> Result<bool> {
        required.validate()?;
        if self.is_superuser() {
            return Ok(true);
        }
        let mut names = required.names().iter();
        Ok(match required.mode() {
            Mode::Any => names.any(|n| self.contains(n)),
            Mode::All => names.all(|n| self.contains(n)),
        })
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
