//! Token-facing entry point for secret operations.
//!
//! Every operation runs the same pipeline: token liveness, scope check,
//! store operation, audit record. Denials are audited as
//! unauthorized_access with the precise reason in metadata, while the
//! caller only ever sees a uniform denial.

use crate::models::{
    normalize_environment, normalize_folder, AccessToken, AuditEvent, Secret, TokenScope,
};

use super::audit_ledger::AuditLedger;
use super::error::ServiceError;
use super::metrics;
use super::scope_enforcer::{self, AccessRequest, Deny};
use super::secret_store::{NewSecret, SecretStore, SecretUpdate};

/// Request-level context attached to audit events.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct AccessGateway {
    store: SecretStore,
    ledger: AuditLedger,
}

impl AccessGateway {
    pub fn new(store: SecretStore, ledger: AuditLedger) -> Self {
        Self { store, ledger }
    }

    /// List secrets visible to the token. The token's own environment and
    /// folder restrictions narrow the listing; an explicit filter that falls
    /// outside them is a denial, not an empty result.
    pub async fn list_secrets(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: Option<&str>,
        folder: Option<&str>,
        meta: &RequestMeta,
    ) -> Result<Vec<Secret>, ServiceError> {
        self.ensure_live(token)?;

        let environment = environment.map(normalize_environment);
        let folder = folder.map(normalize_folder);

        if token.project_id != project_id {
            return self
                .deny(token, project_id, environment.as_deref(), folder.as_deref(), Deny::ProjectMismatch, meta)
                .await;
        }
        if !token.has_scope(TokenScope::Read) {
            return self
                .deny(token, project_id, environment.as_deref(), folder.as_deref(), Deny::MissingScope, meta)
                .await;
        }

        // Reconcile explicit filters with the token's restrictions.
        let effective_env = match (&token.environment, &environment) {
            (Some(t), Some(r)) if !t.eq_ignore_ascii_case(r) => {
                return self
                    .deny(token, project_id, Some(r), folder.as_deref(), Deny::EnvironmentMismatch, meta)
                    .await;
            }
            (Some(t), _) => Some(t.clone()),
            (None, r) => r.clone(),
        };
        let effective_folder = match (&token.folder, &folder) {
            (Some(t), Some(r)) if !t.eq_ignore_ascii_case(r) => {
                return self
                    .deny(token, project_id, effective_env.as_deref(), Some(r), Deny::FolderMismatch, meta)
                    .await;
            }
            (Some(t), _) => Some(t.clone()),
            (None, r) => r.clone(),
        };

        self.store
            .list_secrets(project_id, effective_env.as_deref(), effective_folder.as_deref())
            .await
    }

    /// Fetch a secret's metadata. The value stays masked; no audit event is
    /// recorded for a masked read.
    pub async fn get_secret(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
        meta: &RequestMeta,
    ) -> Result<Secret, ServiceError> {
        let (environment, folder) = self
            .authorize(token, project_id, environment, folder, TokenScope::Read, meta)
            .await?;

        self.store
            .get_secret(project_id, &environment, &folder, name)
            .await
    }

    /// Reveal a secret's plaintext. The secret_access event is written
    /// before the plaintext is returned; if it cannot be written, the
    /// reveal fails.
    pub async fn reveal_secret(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
        meta: &RequestMeta,
    ) -> Result<(Secret, String), ServiceError> {
        let (environment, folder) = self
            .authorize(token, project_id, environment, folder, TokenScope::Read, meta)
            .await?;

        let (secret, plaintext) = self
            .store
            .reveal_secret(project_id, &environment, &folder, name)
            .await?;

        self.ledger
            .record(
                AuditEvent::secret_access(&secret.name, project_id)
                    .scoped(Some(&environment), Some(&folder))
                    .by_token(&token.id)
                    .from_ip(meta.ip_address.clone(), meta.user_agent.clone()),
            )
            .await?;

        metrics::record_secret_operation("reveal");
        Ok((secret, plaintext))
    }

    pub async fn create_secret(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: &str,
        folder: &str,
        input: NewSecret,
        meta: &RequestMeta,
    ) -> Result<Secret, ServiceError> {
        let (environment, folder) = self
            .authorize(token, project_id, environment, folder, TokenScope::Write, meta)
            .await?;

        let secret = self
            .store
            .create_secret(project_id, &environment, &folder, input)
            .await?;

        self.ledger
            .record(
                AuditEvent::secret_create(&secret.name, project_id)
                    .scoped(Some(&environment), Some(&folder))
                    .by_token(&token.id)
                    .from_ip(meta.ip_address.clone(), meta.user_agent.clone()),
            )
            .await?;

        metrics::record_secret_operation("create");
        Ok(secret)
    }

    pub async fn update_secret(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
        update: SecretUpdate,
        meta: &RequestMeta,
    ) -> Result<Secret, ServiceError> {
        let (environment, folder) = self
            .authorize(token, project_id, environment, folder, TokenScope::Write, meta)
            .await?;

        // Moving the secret writes into the target folder, so the target
        // needs the same scope check as the source.
        if let Some(target) = update.folder.as_deref() {
            let target = normalize_folder(target);
            if target != folder {
                let request = AccessRequest {
                    project_id,
                    environment: &environment,
                    folder: &target,
                    scope: TokenScope::Write,
                };
                if let Err(reason) = scope_enforcer::check(token, &request) {
                    return self
                        .deny(token, project_id, Some(&environment), Some(&target), reason, meta)
                        .await;
                }
            }
        }

        let secret = self
            .store
            .update_secret(project_id, &environment, &folder, name, update)
            .await?;

        self.ledger
            .record(
                AuditEvent::secret_update(&secret.name, project_id)
                    .scoped(Some(&environment), Some(&folder))
                    .by_token(&token.id)
                    .from_ip(meta.ip_address.clone(), meta.user_agent.clone()),
            )
            .await?;

        metrics::record_secret_operation("update");
        Ok(secret)
    }

    pub async fn delete_secret(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
        meta: &RequestMeta,
    ) -> Result<(), ServiceError> {
        let (environment, folder) = self
            .authorize(token, project_id, environment, folder, TokenScope::Write, meta)
            .await?;

        // The audit record is the only trace left after a hard delete, so it
        // is written before the row is removed.
        let secret = self
            .store
            .get_secret(project_id, &environment, &folder, name)
            .await?;

        self.ledger
            .record(
                AuditEvent::secret_delete(&secret.name, project_id)
                    .scoped(Some(&environment), Some(&folder))
                    .by_token(&token.id)
                    .from_ip(meta.ip_address.clone(), meta.user_agent.clone()),
            )
            .await?;

        self.store
            .delete_secret(project_id, &environment, &folder, name)
            .await?;

        metrics::record_secret_operation("delete");
        Ok(())
    }

    /// Rename a folder. A folder-restricted token can only rename its own
    /// folder, and the rename is audited once, not per secret moved.
    pub async fn rename_folder(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: &str,
        old_folder: &str,
        new_folder: &str,
        meta: &RequestMeta,
    ) -> Result<u64, ServiceError> {
        let (environment, old_folder) = self
            .authorize(token, project_id, environment, old_folder, TokenScope::Write, meta)
            .await?;

        // The rename writes every moved secret into the new folder, which a
        // folder-restricted token cannot reach.
        let new_folder = normalize_folder(new_folder);
        let request = AccessRequest {
            project_id,
            environment: &environment,
            folder: &new_folder,
            scope: TokenScope::Write,
        };
        if let Err(reason) = scope_enforcer::check(token, &request) {
            return self
                .deny(token, project_id, Some(&environment), Some(&new_folder), reason, meta)
                .await;
        }

        let moved = self
            .store
            .rename_folder(project_id, &environment, &old_folder, &new_folder)
            .await?;

        self.ledger
            .record(
                AuditEvent::folder_rename(&old_folder, &new_folder, project_id)
                    .scoped(Some(&environment), Some(&new_folder))
                    .by_token(&token.id)
                    .with_metadata(serde_json::json!({ "secrets_moved": moved }).to_string())
                    .from_ip(meta.ip_address.clone(), meta.user_agent.clone()),
            )
            .await?;

        metrics::record_secret_operation("rename_folder");
        Ok(moved)
    }

    // Shared front half of the pipeline: liveness, normalization, scope.
    // Returns the normalized (environment, folder) on success.
    async fn authorize(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: &str,
        folder: &str,
        scope: TokenScope,
        meta: &RequestMeta,
    ) -> Result<(String, String), ServiceError> {
        self.ensure_live(token)?;

        let environment = normalize_environment(environment);
        let folder = normalize_folder(folder);

        let request = AccessRequest {
            project_id,
            environment: &environment,
            folder: &folder,
            scope,
        };

        if let Err(reason) = scope_enforcer::check(token, &request) {
            return self
                .deny(token, project_id, Some(&environment), Some(&folder), reason, meta)
                .await;
        }

        Ok((environment, folder))
    }

    // Tokens are validated at the HTTP boundary, but a token can expire or
    // be revoked between validation and use.
    fn ensure_live(&self, token: &AccessToken) -> Result<(), ServiceError> {
        if token.is_revoked() {
            return Err(ServiceError::TokenRevoked);
        }
        if token.is_expired() {
            return Err(ServiceError::TokenExpired);
        }
        Ok(())
    }

    // Audit the denial, then fail. The audit policy applies here too: under
    // fail-closed, an unrecordable denial surfaces as an audit error rather
    // than a silent 403.
    async fn deny<T>(
        &self,
        token: &AccessToken,
        project_id: &str,
        environment: Option<&str>,
        folder: Option<&str>,
        reason: Deny,
        meta: &RequestMeta,
    ) -> Result<T, ServiceError> {
        metrics::record_access_denied(reason.as_str());

        self.ledger
            .record(
                AuditEvent::unauthorized_access(project_id, reason.as_str())
                    .scoped(environment, folder)
                    .by_token(&token.id)
                    .from_ip(meta.ip_address.clone(), meta.user_agent.clone()),
            )
            .await?;

        Err(ServiceError::AccessDenied)
    }
}
