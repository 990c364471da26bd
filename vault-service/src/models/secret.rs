use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fixed placeholder returned in place of a secret's plaintext. Deliberately
/// independent of the real value's length so a masked listing leaks nothing
/// about the value's size or structure.
pub const MASKED_VALUE: &str = "********";

/// Category label for a stored secret. Metadata only: it affects how the UI
/// presents the secret, never how it is encrypted or scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecretType {
    ApiKey,
    DatabaseUrl,
    JwtSecret,
    OauthClientSecret,
    WebhookSecret,
    SshKey,
    Certificate,
    Password,
    Json,
    Url,
    Other,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::ApiKey => "API_KEY",
            SecretType::DatabaseUrl => "DATABASE_URL",
            SecretType::JwtSecret => "JWT_SECRET",
            SecretType::OauthClientSecret => "OAUTH_CLIENT_SECRET",
            SecretType::WebhookSecret => "WEBHOOK_SECRET",
            SecretType::SshKey => "SSH_KEY",
            SecretType::Certificate => "CERTIFICATE",
            SecretType::Password => "PASSWORD",
            SecretType::Json => "JSON",
            SecretType::Url => "URL",
            SecretType::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for SecretType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "API_KEY" => Ok(SecretType::ApiKey),
            "DATABASE_URL" => Ok(SecretType::DatabaseUrl),
            "JWT_SECRET" => Ok(SecretType::JwtSecret),
            "OAUTH_CLIENT_SECRET" => Ok(SecretType::OauthClientSecret),
            "WEBHOOK_SECRET" => Ok(SecretType::WebhookSecret),
            "SSH_KEY" => Ok(SecretType::SshKey),
            "CERTIFICATE" => Ok(SecretType::Certificate),
            "PASSWORD" => Ok(SecretType::Password),
            "JSON" => Ok(SecretType::Json),
            "URL" => Ok(SecretType::Url),
            "OTHER" => Ok(SecretType::Other),
            other => Err(format!("Unknown secret type: {}", other)),
        }
    }
}

impl std::fmt::Display for SecretType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored secret. `value` always holds the ciphertext envelope
/// (`nonce_hex:ciphertext_hex`); plaintext exists only transiently after an
/// explicit reveal.
#[derive(Debug, Clone)]
pub struct Secret {
    pub id: String,
    pub project_id: String,
    pub environment: String,
    pub folder: String,
    pub name: String,
    pub secret_type: SecretType,
    pub value: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: String,
        environment: String,
        folder: String,
        name: String,
        secret_type: SecretType,
        encrypted_value: String,
        description: Option<String>,
        created_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            environment,
            folder,
            name,
            secret_type,
            value: encrypted_value,
            description,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Wire representation of a secret. `value` is either the fixed mask or, on
/// an explicit reveal, the decrypted plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SecretResponse {
    pub id: String,
    pub project_id: String,
    pub environment: String,
    pub folder: String,
    pub name: String,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretResponse {
    /// Masked projection: the plaintext is replaced by the fixed placeholder.
    pub fn masked(secret: &Secret) -> Self {
        Self::with_value(secret, MASKED_VALUE.to_string())
    }

    /// Revealed projection. Callers are responsible for recording the
    /// corresponding secret_access audit event.
    pub fn revealed(secret: &Secret, plaintext: String) -> Self {
        Self::with_value(secret, plaintext)
    }

    fn with_value(secret: &Secret, value: String) -> Self {
        Self {
            id: secret.id.clone(),
            project_id: secret.project_id.clone(),
            environment: secret.environment.clone(),
            folder: secret.folder.clone(),
            name: secret.name.clone(),
            secret_type: secret.secret_type,
            value,
            description: secret.description.clone(),
            created_by: secret.created_by.clone(),
            created_at: secret.created_at,
            updated_at: secret.updated_at,
        }
    }
}

/// Normalize an environment name the way it is stored and compared:
/// trimmed and lowercased.
pub fn normalize_environment(environment: &str) -> String {
    environment.trim().to_lowercase()
}

/// Normalize a folder name to its slug form. Empty input falls back to
/// "default".
pub fn normalize_folder(folder: &str) -> String {
    let slug: String = folder
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');

    // Collapse runs of separators left by consecutive non-alphanumerics
    let mut out = String::with_capacity(slug.len());
    let mut prev_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !prev_dash {
                out.push('-');
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }

    if out.is_empty() {
        "default".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_type_round_trip() {
        for t in [
            SecretType::ApiKey,
            SecretType::DatabaseUrl,
            SecretType::JwtSecret,
            SecretType::OauthClientSecret,
            SecretType::WebhookSecret,
            SecretType::SshKey,
            SecretType::Certificate,
            SecretType::Password,
            SecretType::Json,
            SecretType::Url,
            SecretType::Other,
        ] {
            assert_eq!(t.as_str().parse::<SecretType>().unwrap(), t);
        }
    }

    #[test]
    fn test_masked_response_hides_value() {
        let secret = Secret::new(
            "proj-1".into(),
            "development".into(),
            "default".into(),
            "DB_URL".into(),
            SecretType::DatabaseUrl,
            "aabb:ccdd".into(),
            None,
            None,
        );

        let masked = SecretResponse::masked(&secret);
        assert_eq!(masked.value, MASKED_VALUE);
    }

    #[test]
    fn test_normalize_environment() {
        assert_eq!(normalize_environment("  Production "), "production");
        assert_eq!(normalize_environment("DEV"), "dev");
    }

    #[test]
    fn test_normalize_folder() {
        assert_eq!(normalize_folder("My Folder"), "my-folder");
        assert_eq!(normalize_folder("  "), "default");
        assert_eq!(normalize_folder(""), "default");
        assert_eq!(normalize_folder("api__keys!!"), "api-keys");
        assert_eq!(normalize_folder("default"), "default");
    }
}
