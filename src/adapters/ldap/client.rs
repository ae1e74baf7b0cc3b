//! LDAP simple-bind verifier on `ldap3`

use super::{bind_candidates, map_roles, AuthenticatedUser, CredentialVerifier};
use crate::config::LdapConfig;
use crate::domain::{Result, SyncError};
use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::time::Duration;

/// Verifies credentials by binding as the user and reading their groups
pub struct LdapVerifier {
    config: LdapConfig,
}

impl LdapVerifier {
    pub fn new(config: LdapConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(10))
            .set_starttls(self.config.use_starttls);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.server_url)
            .await
            .map_err(|e| SyncError::Authentication(format!("LDAP authentication error: {e}")))?;
        ldap3::drive!(conn);
        Ok(ldap)
    }

    async fn bind(&self, ldap: &mut Ldap, username: &str, password: &str) -> Result<()> {
        for candidate in bind_candidates(username, self.config.host(), &self.config.domain) {
            match ldap
                .simple_bind(&candidate, password)
                .await
                .and_then(|result| result.success())
            {
                Ok(_) => {
                    tracing::debug!(bind_name = %candidate, "LDAP bind succeeded");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(bind_name = %candidate, error = %e, "LDAP bind failed");
                }
            }
        }
        Err(SyncError::Authentication(
            "Failed to authenticate with LDAP server".to_string(),
        ))
    }
}

#[async_trait]
impl CredentialVerifier for LdapVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<AuthenticatedUser> {
        // An empty password turns a simple bind into an unauthenticated one.
        if username.trim().is_empty() || password.is_empty() {
            return Err(SyncError::Authentication(
                "Invalid username or password".to_string(),
            ));
        }

        let mut ldap = self.connect().await?;
        self.bind(&mut ldap, username, password).await?;

        let filter = format!(
            "(&(UserPrincipalName={})(ObjectClass=user))",
            ldap_escape(username)
        );
        let group_field = self.config.group_field.as_str();

        let (entries, _) = ldap
            .search(
                &self.config.user_search_base,
                Scope::Subtree,
                &filter,
                vec![group_field],
            )
            .await
            .and_then(|result| result.success())
            .map_err(|e| SyncError::Authentication(format!("LDAP authentication error: {e}")))?;

        if let Err(e) = ldap.unbind().await {
            tracing::debug!(error = %e, "LDAP unbind failed");
        }

        if entries.is_empty() {
            return Err(SyncError::Authentication(
                "User not found or no groups assigned".to_string(),
            ));
        }

        let groups: Vec<String> = entries
            .into_iter()
            .map(SearchEntry::construct)
            .flat_map(|entry| {
                entry
                    .attrs
                    .iter()
                    .filter(|(name, _)| name.eq_ignore_ascii_case(group_field))
                    .flat_map(|(_, values)| values.clone())
                    .collect::<Vec<_>>()
            })
            .collect();

        let roles = map_roles(&groups, &self.config.role_mappings);
        tracing::info!(username = %username, roles = ?roles, "User authenticated");

        Ok(AuthenticatedUser {
            username: username.to_string(),
            roles,
        })
    }
}
