use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Alert severity derived from an audit event, consumed by the security
/// dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Classify an event for security alerting. Pure function of
    /// (event_type, action) so it can be tested without a store.
    pub fn classify(event_type: &str, action: &str) -> Severity {
        match (event_type, action) {
            ("user_login", "failed") => Severity::High,
            ("unauthorized_access", _) => Severity::Critical,
            ("suspicious_activity", _) => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

/// One row of the append-only audit trail. Events are written synchronously
/// as part of the operation they describe and are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub event_type: String,
    pub action: String,

    /// Acting user, when the operation came through a session.
    pub user_id: Option<String>,
    /// Acting token, when the operation came through the token API.
    pub token_id: Option<String>,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
    pub environment: Option<String>,
    pub folder: Option<String>,
    pub resource_name: Option<String>,
    pub description: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Free-form context, serialized JSON.
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(event_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            action: action.into(),
            user_id: None,
            token_id: None,
            organization_id: None,
            project_id: None,
            environment: None,
            folder: None,
            resource_name: None,
            description: None,
            ip_address: None,
            user_agent: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn secret_access(secret_name: &str, project_id: &str) -> Self {
        Self::new("secret_access", "view")
            .resource(format!("Secret: {}", secret_name))
            .describe(format!("Secret \"{}\" value revealed", secret_name))
            .project(project_id)
    }

    pub fn secret_create(secret_name: &str, project_id: &str) -> Self {
        Self::new("secret_create", "create")
            .resource(format!("Secret: {}", secret_name))
            .describe(format!("Created secret \"{}\"", secret_name))
            .project(project_id)
    }

    pub fn secret_update(secret_name: &str, project_id: &str) -> Self {
        Self::new("secret_update", "update")
            .resource(format!("Secret: {}", secret_name))
            .describe(format!("Updated secret \"{}\"", secret_name))
            .project(project_id)
    }

    pub fn secret_delete(secret_name: &str, project_id: &str) -> Self {
        Self::new("secret_delete", "delete")
            .resource(format!("Secret: {}", secret_name))
            .describe(format!("Deleted secret \"{}\"", secret_name))
            .project(project_id)
    }

    pub fn folder_rename(old_folder: &str, new_folder: &str, project_id: &str) -> Self {
        Self::new("folder_rename", "update")
            .resource(format!("Folder: {}", old_folder))
            .describe(format!(
                "Renamed folder \"{}\" to \"{}\"",
                old_folder, new_folder
            ))
            .project(project_id)
    }

    pub fn unauthorized_access(project_id: &str, reason: &str) -> Self {
        Self::new("unauthorized_access", "denied")
            .describe("Token denied for requested secret operation".to_string())
            .with_metadata(serde_json::json!({ "reason": reason }).to_string())
            .project(project_id)
    }

    pub fn token_create(token_name: Option<&str>, project_id: &str) -> Self {
        let label = token_name.unwrap_or("unnamed");
        Self::new("token_create", "create")
            .resource(format!("Token: {}", label))
            .describe(format!("Issued access token \"{}\"", label))
            .project(project_id)
    }

    pub fn token_revoke(token_id: &str, project_id: &str) -> Self {
        Self::new("token_revoke", "delete")
            .resource(format!("Token: {}", token_id))
            .describe("Revoked access token".to_string())
            .project(project_id)
    }

    pub fn device_authorize(project_id: &str) -> Self {
        Self::new("device_authorize", "success")
            .describe("Device code exchanged for access token".to_string())
            .project(project_id)
    }

    // Builder-style setters used by the helpers above and by the gateway to
    // attach request context.

    pub fn project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn resource(mut self, resource_name: String) -> Self {
        self.resource_name = Some(resource_name);
        self
    }

    pub fn describe(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_metadata(mut self, metadata: String) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn scoped(mut self, environment: Option<&str>, folder: Option<&str>) -> Self {
        self.environment = environment.map(|s| s.to_string());
        self.folder = folder.map(|s| s.to_string());
        self
    }

    pub fn by_token(mut self, token_id: &str) -> Self {
        self.token_id = Some(token_id.to_string());
        self
    }

    pub fn by_user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(|s| s.to_string());
        self
    }

    pub fn organization(mut self, organization_id: Option<&str>) -> Self {
        self.organization_id = organization_id.map(|s| s.to_string());
        self
    }

    pub fn from_ip(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn severity(&self) -> Severity {
        Severity::classify(&self.event_type, &self.action)
    }
}

/// Audit event as returned by the query endpoints, annotated with its
/// derived severity.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEventResponse {
    pub id: String,
    pub event_type: String,
    pub action: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(event: AuditEvent) -> Self {
        let severity = event.severity();
        Self {
            id: event.id,
            event_type: event.event_type,
            action: event.action,
            severity,
            user_id: event.user_id,
            token_id: event.token_id,
            organization_id: event.organization_id,
            project_id: event.project_id,
            environment: event.environment,
            folder: event.folder,
            resource_name: event.resource_name,
            description: event.description,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            metadata: event.metadata,
            created_at: event.created_at,
        }
    }
}
