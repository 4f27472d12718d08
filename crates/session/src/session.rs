// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session record shared by the token keeper and the permission evaluator.
//!
//! Written by login, logout and successful refreshes; read by everything
//! else. Every write is mirrored into the injected [`SessionStorage`].

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::{roles_grant_admin, PermissionSet};
use crate::refresh::TokenGrant;
use crate::storage::SessionStorage;
use crate::token;

const KEY_ACCESS_TOKEN: &str = "access_token";
const KEY_REFRESH_TOKEN: &str = "refresh_token";
const KEY_PERMISSIONS: &str = "permissions";
const KEY_ROLES: &str = "roles";

/// Credentials and authorization data returned by a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginGrant {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    logged_in: bool,
    permissions: PermissionSet,
    roles: Vec<String>,
    session_id: Option<Uuid>,
    /// Bumped on every login and logout.
    generation: u64,
}

impl SessionState {
    fn is_authenticated(&self) -> bool {
        self.logged_in && non_empty(&self.access_token) && non_empty(&self.refresh_token)
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Shared, explicitly owned session context.
pub struct SessionStore {
    state: RwLock<SessionState>,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    /// Create an empty (logged out) session that persists into `storage`.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Arc<Self> {
        Arc::new(Self { state: RwLock::new(SessionState::default()), storage })
    }

    /// Rebuild the session from whatever `storage` holds.
    ///
    /// A stored session counts as logged in when both tokens are present.
    pub fn restore(storage: Arc<dyn SessionStorage>) -> Arc<Self> {
        let access_token = storage.get(KEY_ACCESS_TOKEN).filter(|t| !t.is_empty());
        let refresh_token = storage.get(KEY_REFRESH_TOKEN).filter(|t| !t.is_empty());
        let permissions: Vec<String> = read_list(storage.as_ref(), KEY_PERMISSIONS);
        let roles: Vec<String> = read_list(storage.as_ref(), KEY_ROLES);
        let logged_in = access_token.is_some() && refresh_token.is_some();

        let state = SessionState {
            access_token,
            refresh_token,
            logged_in,
            permissions: PermissionSet::new(permissions, roles_grant_admin(&roles)),
            roles,
            session_id: logged_in.then(Uuid::new_v4),
            generation: u64::from(logged_in),
        };
        if let Some(id) = state.session_id {
            tracing::info!(session = %id, "session restored from storage");
        }
        Arc::new(Self { state: RwLock::new(state), storage })
    }

    /// Replace the session with a fresh login. Returns the new session id.
    pub fn login(&self, grant: LoginGrant) -> anyhow::Result<Uuid> {
        if grant.access_token.is_empty() {
            anyhow::bail!("login grant has an empty access token");
        }
        if grant.refresh_token.is_empty() {
            anyhow::bail!("login grant has an empty refresh token");
        }

        let id = Uuid::new_v4();
        {
            let mut state = self.state.write();
            let generation = state.generation + 1;
            *state = SessionState {
                permissions: PermissionSet::new(
                    grant.permissions.iter().cloned(),
                    roles_grant_admin(&grant.roles),
                ),
                access_token: Some(grant.access_token.clone()),
                refresh_token: Some(grant.refresh_token.clone()),
                logged_in: true,
                roles: grant.roles.clone(),
                session_id: Some(id),
                generation,
            };
        }

        self.store(KEY_ACCESS_TOKEN, &grant.access_token);
        self.store(KEY_REFRESH_TOKEN, &grant.refresh_token);
        self.store_list(KEY_PERMISSIONS, &grant.permissions);
        self.store_list(KEY_ROLES, &grant.roles);
        tracing::info!(session = %id, permissions = grant.permissions.len(), "logged in");
        Ok(id)
    }

    /// Clear the session and its persisted copy.
    pub fn logout(&self) {
        let previous = {
            let mut state = self.state.write();
            let generation = state.generation + 1;
            let previous = state.session_id;
            *state = SessionState { generation, ..SessionState::default() };
            previous
        };
        for key in [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_PERMISSIONS, KEY_ROLES] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, err = %e, "failed to remove persisted session field");
            }
        }
        if let Some(id) = previous {
            tracing::info!(session = %id, "logged out");
        }
    }

    /// Store refreshed tokens if the session is still the one the refresh
    /// started under. Returns whether the grant was applied.
    pub fn apply_refresh(&self, generation: u64, grant: &TokenGrant) -> bool {
        if grant.access_token.is_empty() {
            return false;
        }
        let new_refresh = grant.refresh_token.as_deref().filter(|t| !t.is_empty());
        {
            let mut state = self.state.write();
            if state.generation != generation || !state.is_authenticated() {
                return false;
            }
            state.access_token = Some(grant.access_token.clone());
            if let Some(rt) = new_refresh {
                state.refresh_token = Some(rt.to_owned());
            }
        }
        self.store(KEY_ACCESS_TOKEN, &grant.access_token);
        if let Some(rt) = new_refresh {
            self.store(KEY_REFRESH_TOKEN, rt);
        }
        true
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().refresh_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.state.read().session_id
    }

    /// Run `f` against the current permission set under the read lock.
    pub fn with_permissions<R>(&self, f: impl FnOnce(&PermissionSet) -> R) -> R {
        f(&self.state.read().permissions)
    }

    /// Point-in-time view for status reporting.
    pub fn snapshot(&self, now: i64, expiring_buffer_secs: i64) -> SessionSnapshot {
        let state = self.state.read();
        let access = state.access_token.as_deref();
        let authenticated = state.is_authenticated();
        SessionSnapshot {
            authenticated,
            session_id: state.session_id,
            expires_in_secs: token::token_expiry_time(access, now),
            expiring_soon: authenticated
                && token::is_token_expiring_soon(access, expiring_buffer_secs, now),
            is_admin: state.permissions.is_admin(),
            permissions: state.permissions.names().map(str::to_owned).collect(),
            roles: state.roles.clone(),
        }
    }

    fn store(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            tracing::warn!(key, err = %e, "failed to persist session field");
        }
    }

    fn store_list(&self, key: &str, values: &[String]) {
        match serde_json::to_string(values) {
            Ok(json) => self.store(key, &json),
            Err(e) => tracing::warn!(key, err = %e, "failed to encode session field"),
        }
    }
}

fn read_list(storage: &dyn SessionStorage, key: &str) -> Vec<String> {
    let Some(raw) = storage.get(key) else {
        return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(key, err = %e, "ignoring unreadable persisted session field");
        Vec::new()
    })
}

/// Serializable view of the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<i64>,
    pub expiring_soon: bool,
    pub is_admin: bool,
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
