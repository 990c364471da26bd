//! Token issuance, validation, revocation, and the CLI device flow.
//!
//! Plaintext tokens exist in two places only: the mint response and the
//! one-time device-flow handoff cache. Everything else works from the
//! SHA-256 hash.
//!
//! Lifecycle audit events are written before the matching row change, so
//! under the fail-closed audit policy an unauditable mint never leaves an
//! active token behind.

use chrono::Utc;
use dashmap::DashMap;
use rand::RngCore;

use crate::db::Database;
use crate::models::{
    normalize_environment, normalize_folder, AccessToken, AuditEvent, DeviceCode, TokenScope,
};

use super::audit_ledger::AuditLedger;
use super::error::ServiceError;
use super::gateway::RequestMeta;

/// Prefix for personal access tokens issued through the session API.
pub const PAT_PREFIX: &str = "kv_pat_";

/// Prefix for tokens minted by the CLI device flow.
pub const CLI_PREFIX: &str = "kv_cli_";

/// Parameters for minting a token.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub name: Option<String>,
    pub project_id: String,
    pub environment: Option<String>,
    pub folder: Option<String>,
    pub scopes: Vec<TokenScope>,
    pub ttl_minutes: Option<i64>,
}

/// Outcome of a device-flow poll.
#[derive(Debug)]
pub enum DevicePoll {
    Pending,
    Ready { token_id: String, token: String },
}

/// Who asked for the lifecycle change, for audit attribution.
#[derive(Debug, Clone, Default)]
pub struct Issuer {
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
    pub meta: RequestMeta,
}

pub struct TokenAuthority {
    db: Database,
    ledger: AuditLedger,
    // device_code -> (plaintext token, handoff deadline), held between
    // approval and the single successful poll. Never persisted.
    pending_cli_tokens: DashMap<String, (String, chrono::DateTime<Utc>)>,
}

impl TokenAuthority {
    pub fn new(db: Database, ledger: AuditLedger) -> Self {
        Self {
            db,
            ledger,
            pending_cli_tokens: DashMap::new(),
        }
    }

    /// Mint a token. The returned plaintext is shown to the caller exactly
    /// once; only its hash is stored. The token_create event is written
    /// before the row: a token that cannot be audited is never issued.
    pub async fn mint(
        &self,
        grant: TokenGrant,
        prefix: &str,
        issuer: &Issuer,
    ) -> Result<(AccessToken, String), ServiceError> {
        if grant.scopes.is_empty() {
            return Err(ServiceError::ValidationError(
                "Token must carry at least one scope".to_string(),
            ));
        }
        if let Some(ttl) = grant.ttl_minutes {
            if ttl <= 0 {
                return Err(ServiceError::ValidationError(
                    "Token TTL must be positive".to_string(),
                ));
            }
        }

        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let plaintext = format!("{}{}", prefix, hex::encode(raw));

        let token = AccessToken::new(
            grant.name,
            &plaintext,
            grant.project_id,
            grant.environment.as_deref().map(normalize_environment),
            grant.folder.as_deref().map(normalize_folder),
            grant.scopes,
            grant.ttl_minutes,
        );

        self.ledger
            .record(
                AuditEvent::token_create(token.name.as_deref(), &token.project_id)
                    .scoped(token.environment.as_deref(), token.folder.as_deref())
                    .by_user(issuer.user_id.as_deref())
                    .organization(issuer.organization_id.as_deref())
                    .from_ip(issuer.meta.ip_address.clone(), issuer.meta.user_agent.clone()),
            )
            .await?;

        self.db.insert_token(&token).await?;
        Ok((token, plaintext))
    }

    /// Resolve a presented plaintext token to its live record. Unknown,
    /// expired, and revoked tokens each fail with their own variant; the
    /// HTTP layer collapses them into one uniform 401.
    pub async fn validate(&self, plaintext: &str) -> Result<AccessToken, ServiceError> {
        let hash = AccessToken::hash_token(plaintext);

        let token = self
            .db
            .find_token_by_hash(&hash)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        if token.is_revoked() {
            return Err(ServiceError::TokenRevoked);
        }
        if token.is_expired() {
            return Err(ServiceError::TokenExpired);
        }

        // Fire-and-forget: last_used_at is advisory and must not add latency
        // or failure modes to the request path.
        let db = self.db.clone();
        let token_id = token.id.clone();
        tokio::spawn(async move {
            if let Err(e) = db.touch_token_last_used(&token_id, Utc::now()).await {
                tracing::warn!(error = %e, token_id = %token_id, "failed to update last_used_at");
            }
        });

        Ok(token)
    }

    /// Revoke a token. Revocation is terminal and idempotent: revoking an
    /// already-revoked token succeeds without moving revoked_at, and only
    /// the actual transition is audited.
    pub async fn revoke(
        &self,
        token_id: &str,
        issuer: &Issuer,
    ) -> Result<AccessToken, ServiceError> {
        let token = self
            .db
            .find_token_by_id(token_id)
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        if token.is_revoked() {
            return Ok(token);
        }

        self.ledger
            .record(
                AuditEvent::token_revoke(&token.id, &token.project_id)
                    .by_user(issuer.user_id.as_deref())
                    .organization(issuer.organization_id.as_deref())
                    .from_ip(issuer.meta.ip_address.clone(), issuer.meta.user_agent.clone()),
            )
            .await?;

        let now = Utc::now();
        self.db.revoke_token(token_id, now).await?;

        self.db
            .find_token_by_id(token_id)
            .await?
            .ok_or(ServiceError::TokenNotFound)
    }

    pub async fn list(&self, project_id: &str) -> Result<Vec<AccessToken>, ServiceError> {
        Ok(self.db.list_tokens(project_id).await?)
    }

    // ==================== CLI Device Flow ====================

    /// Start a device authorization: returns the code pair the CLI displays
    /// and polls with.
    pub async fn start_device_flow(&self) -> Result<DeviceCode, ServiceError> {
        let code = DeviceCode::new();
        self.db.insert_device_code(&code).await?;
        Ok(code)
    }

    /// Approve a pending user code from an authenticated browser session.
    /// Mints the CLI token and parks its plaintext for the next poll. Both
    /// audit events land before the token exists anywhere.
    pub async fn approve_device(
        &self,
        user_code: &str,
        issuer: &Issuer,
        grant: TokenGrant,
    ) -> Result<DeviceCode, ServiceError> {
        let code = self
            .db
            .find_device_code_by_user_code(&user_code.trim().to_uppercase())
            .await?
            .ok_or(ServiceError::DeviceCodeNotFound)?;

        if code.is_expired() {
            self.db.delete_device_code(&code.device_code).await?;
            return Err(ServiceError::DeviceCodeExpired);
        }
        if code.is_verified() {
            return Err(ServiceError::DeviceCodeConsumed);
        }

        self.ledger
            .record(
                AuditEvent::device_authorize(&grant.project_id)
                    .by_user(issuer.user_id.as_deref())
                    .organization(issuer.organization_id.as_deref())
                    .from_ip(issuer.meta.ip_address.clone(), issuer.meta.user_agent.clone()),
            )
            .await?;

        let (token, plaintext) = self.mint(grant, CLI_PREFIX, issuer).await?;

        self.pending_cli_tokens
            .insert(code.device_code.clone(), (plaintext, code.expires_at));
        self.db
            .mark_device_code_verified(
                &code.user_code,
                issuer.user_id.as_deref(),
                &token.id,
                Utc::now(),
            )
            .await?;

        self.db
            .find_device_code(&code.device_code)
            .await?
            .ok_or(ServiceError::DeviceCodeNotFound)
    }

    /// CLI poll. Hands the plaintext token over exactly once; a second poll
    /// after a successful handoff fails.
    pub async fn poll_device(&self, device_code: &str) -> Result<DevicePoll, ServiceError> {
        let code = self
            .db
            .find_device_code(device_code)
            .await?
            .ok_or(ServiceError::DeviceCodeNotFound)?;

        if code.is_expired() {
            self.pending_cli_tokens.remove(device_code);
            self.db.delete_device_code(device_code).await?;
            return Err(ServiceError::DeviceCodeExpired);
        }

        if !code.is_verified() {
            return Ok(DevicePoll::Pending);
        }

        let token_id = code.token_id.ok_or(ServiceError::DeviceCodeConsumed)?;

        match self.pending_cli_tokens.remove(device_code) {
            Some((_, (token, _))) => {
                self.db.delete_device_code(device_code).await?;
                Ok(DevicePoll::Ready { token_id, token })
            }
            None => Err(ServiceError::DeviceCodeConsumed),
        }
    }

    /// Drop expired device codes and their parked tokens. Run periodically.
    pub async fn cleanup_expired_device_codes(&self) -> Result<u64, ServiceError> {
        let now = Utc::now();
        self.pending_cli_tokens
            .retain(|_, (_, deadline)| *deadline > now);
        let removed = self.db.delete_expired_device_codes().await?;
        Ok(removed)
    }
}
