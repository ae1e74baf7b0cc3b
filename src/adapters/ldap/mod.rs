//! Directory-backed credential verification

pub mod client;

pub use client::LdapVerifier;

use crate::domain::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A user whose credentials were accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub roles: Vec<String>,
}

/// Verifies a username/password pair
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`crate::domain::SyncError::Authentication`] when the
    /// credentials are rejected or the user has no directory entry.
    async fn verify(&self, username: &str, password: &str) -> Result<AuthenticatedUser>;
}

/// Bind names tried in order: `user@host`, `DOMAIN\user`, then the raw name
pub fn bind_candidates(username: &str, host: &str, domain: &str) -> Vec<String> {
    vec![
        format!("{username}@{host}"),
        format!("{domain}\\{username}"),
        username.to_string(),
    ]
}

/// Roles granted by the user's groups; `["User"]` when none map
pub fn map_roles(groups: &[String], role_mappings: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let mut roles: Vec<String> = role_mappings
        .iter()
        .filter(|(group, _)| groups.iter().any(|g| g == *group))
        .flat_map(|(_, granted)| granted.iter().cloned())
        .collect();

    if roles.is_empty() {
        roles.push("User".to_string());
    }
    roles
}
