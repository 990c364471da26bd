use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

/// Capability granted to an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Read,
    Write,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Read => "read",
            TokenScope::Write => "write",
        }
    }
}

impl std::str::FromStr for TokenScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(TokenScope::Read),
            "write" => Ok(TokenScope::Write),
            other => Err(format!("Unknown token scope: {}", other)),
        }
    }
}

/// A minted access token. The plaintext is handed out exactly once at mint
/// time; only `token_hash` is ever persisted. Scope is immutable after
/// issuance: narrowing or widening means revoke-and-reissue.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub id: String,

    /// Human label chosen at issuance.
    pub name: Option<String>,

    /// SHA-256 hex of the plaintext token.
    pub token_hash: String,

    /// Every token is pinned to exactly one project.
    pub project_id: String,

    /// Optional environment filter; None allows any environment within the
    /// project.
    pub environment: Option<String>,

    /// Optional folder filter; None allows any folder.
    pub folder: Option<String>,

    pub scopes: Vec<TokenScope>,

    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: Option<String>,
        plaintext: &str,
        project_id: String,
        environment: Option<String>,
        folder: Option<String>,
        scopes: Vec<TokenScope>,
        ttl_minutes: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            token_hash: Self::hash_token(plaintext),
            project_id,
            environment,
            folder,
            scopes,
            created_at: now,
            expires_at: ttl_minutes.map(|m| now + Duration::minutes(m)),
            last_used_at: None,
            revoked_at: None,
        }
    }

    /// Hash a token using SHA-256
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() > at)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// A token is active when it is neither expired nor revoked. Both
    /// terminal states are permanent.
    pub fn is_active(&self) -> bool {
        !self.is_expired() && !self.is_revoked()
    }

    pub fn has_scope(&self, scope: TokenScope) -> bool {
        self.scopes.contains(&scope)
    }

    pub fn scopes_string(&self) -> String {
        self.scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn parse_scopes(raw: &str) -> Vec<TokenScope> {
        raw.split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

/// Token metadata as returned by list/issue endpoints. Never carries the
/// plaintext or the stored hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    pub scopes: Vec<TokenScope>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<AccessToken> for AccessTokenResponse {
    fn from(token: AccessToken) -> Self {
        Self {
            id: token.id,
            name: token.name,
            project_id: token.project_id,
            environment: token.environment,
            folder: token.folder,
            scopes: token.scopes,
            created_at: token.created_at,
            expires_at: token.expires_at,
            last_used_at: token.last_used_at,
            revoked_at: token.revoked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_token(ttl_minutes: Option<i64>) -> AccessToken {
        AccessToken::new(
            Some("ci".to_string()),
            "kv_pat_deadbeef",
            "proj-1".to_string(),
            Some("development".to_string()),
            Some("default".to_string()),
            vec![TokenScope::Read],
            ttl_minutes,
        )
    }

    #[test]
    fn test_token_hash_is_not_plaintext() {
        let token = test_token(None);
        assert_ne!(token.token_hash, "kv_pat_deadbeef");
        assert_eq!(token.token_hash, AccessToken::hash_token("kv_pat_deadbeef"));
        assert_eq!(token.token_hash.len(), 64);
    }

    #[test]
    fn test_token_expiry() {
        let mut token = test_token(Some(60));
        assert!(token.is_active());

        token.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(token.is_expired());
        assert!(!token.is_active());
    }

    #[test]
    fn test_token_without_expiry_never_expires() {
        let token = test_token(None);
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_revocation_is_terminal() {
        let mut token = test_token(None);
        token.revoked_at = Some(Utc::now());
        assert!(!token.is_active());
    }

    #[test]
    fn test_scopes_round_trip() {
        let token = AccessToken::new(
            None,
            "t",
            "p".into(),
            None,
            None,
            vec![TokenScope::Read, TokenScope::Write],
            None,
        );
        assert_eq!(token.scopes_string(), "read,write");
        assert_eq!(
            AccessToken::parse_scopes("read,write"),
            vec![TokenScope::Read, TokenScope::Write]
        );
        assert_eq!(AccessToken::parse_scopes(""), Vec::<TokenScope>::new());
    }
}
