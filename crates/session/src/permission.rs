// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission checks with administrator override.
//!
//! All checks are synchronous and side-effect free. An administrator passes
//! every check, including checks against an empty requirement list.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::SessionStore;

/// Role name that grants the administrator override.
pub const ADMIN_ROLE: &str = "admin";

/// Whether `roles` contains the administrator role (case-insensitive).
pub fn roles_grant_admin<S: AsRef<str>>(roles: &[S]) -> bool {
    roles.iter().any(|r| r.as_ref().eq_ignore_ascii_case(ADMIN_ROLE))
}

/// Permission names held by a session plus the derived admin flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    names: BTreeSet<String>,
    is_admin: bool,
}

impl PermissionSet {
    pub fn new<I, S>(names: I, is_admin: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect(), is_admin }
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.is_admin || self.names.contains(name)
    }

    /// Any listed permission suffices. An empty list grants nothing (except to
    /// an administrator).
    pub fn has_any_permission<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.is_admin || names.into_iter().any(|n| self.names.contains(n.as_ref()))
    }

    /// Every listed permission is required. An empty list is vacuously held.
    pub fn has_all_permissions<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.is_admin || names.into_iter().all(|n| self.names.contains(n.as_ref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Evaluates permission checks against the live session.
#[derive(Clone)]
pub struct PermissionEvaluator {
    session: Arc<SessionStore>,
}

impl PermissionEvaluator {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.session.with_permissions(|p| p.has_permission(name))
    }

    pub fn has_any_permission<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.session.with_permissions(|p| p.has_any_permission(names))
    }

    pub fn has_all_permissions<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.session.with_permissions(|p| p.has_all_permissions(names))
    }

    pub fn is_admin(&self) -> bool {
        self.session.with_permissions(PermissionSet::is_admin)
    }

    pub fn check(&self, requirement: &PermissionRequirement) -> bool {
        self.session.with_permissions(|p| requirement.is_satisfied_by(p))
    }
}

/// What a guarded page or control needs in order to be shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequirement {
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Require every listed permission instead of any one of them.
    #[serde(default)]
    pub require_all: bool,
    /// Only administrators pass, regardless of `permissions`.
    #[serde(default)]
    pub admin_only: bool,
}

impl PermissionRequirement {
    pub fn any_of<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            require_all: false,
            admin_only: false,
        }
    }

    pub fn all_of<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { require_all: true, ..Self::any_of(permissions) }
    }

    pub fn admin_only() -> Self {
        Self { admin_only: true, ..Self::default() }
    }

    pub fn is_satisfied_by(&self, set: &PermissionSet) -> bool {
        // Admin short-circuits before any specific permission is looked at.
        if set.is_admin() {
            return true;
        }
        if self.admin_only {
            return false;
        }
        if self.require_all {
            set.has_all_permissions(&self.permissions)
        } else {
            set.has_any_permission(&self.permissions)
        }
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
