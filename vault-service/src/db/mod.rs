//! SQLite persistence for the vault core.
//!
//! A thin typed wrapper over a sqlx pool. Uniqueness of the
//! (project, environment, folder, name) key is enforced by the database so
//! concurrent create races resolve to exactly one winner, and folder renames
//! run inside a single transaction.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::models::{AccessToken, AuditEvent, DeviceCode, Secret, SecretType};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS secrets (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    environment TEXT NOT NULL,
    folder TEXT NOT NULL DEFAULT 'default',
    name TEXT NOT NULL,
    secret_type TEXT NOT NULL,
    value TEXT NOT NULL,
    description TEXT,
    created_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_secrets_key
    ON secrets (project_id, environment, folder, name);

CREATE TABLE IF NOT EXISTS access_tokens (
    id TEXT PRIMARY KEY,
    name TEXT,
    token_hash TEXT NOT NULL UNIQUE,
    project_id TEXT NOT NULL,
    environment TEXT,
    folder TEXT,
    scopes TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    last_used_at TEXT,
    revoked_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_access_tokens_project
    ON access_tokens (project_id);

-- Append-only: nothing in this service issues UPDATE or DELETE against it.
CREATE TABLE IF NOT EXISTS audit_events (
    id TEXT PRIMARY KEY,
    event_type TEXT NOT NULL,
    action TEXT NOT NULL,
    user_id TEXT,
    token_id TEXT,
    organization_id TEXT,
    project_id TEXT,
    environment TEXT,
    folder TEXT,
    resource_name TEXT,
    description TEXT,
    ip_address TEXT,
    user_agent TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_events_created
    ON audit_events (created_at DESC);
CREATE INDEX IF NOT EXISTS idx_audit_events_folder
    ON audit_events (project_id, environment, folder);

CREATE TABLE IF NOT EXISTS device_codes (
    device_code TEXT PRIMARY KEY,
    user_code TEXT NOT NULL UNIQUE,
    user_id TEXT,
    token_id TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    verified_at TEXT
);
"#;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `url` and apply the schema.
    /// In-memory databases are pinned to a single connection so every handle
    /// sees the same data.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== Secret Operations ====================

    pub async fn insert_secret(&self, secret: &Secret) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO secrets
                (id, project_id, environment, folder, name, secret_type, value,
                 description, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&secret.id)
        .bind(&secret.project_id)
        .bind(&secret.environment)
        .bind(&secret.folder)
        .bind(&secret.name)
        .bind(secret.secret_type.as_str())
        .bind(&secret.value)
        .bind(&secret.description)
        .bind(&secret.created_by)
        .bind(secret.created_at)
        .bind(secret.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_secret(
        &self,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
    ) -> Result<Option<Secret>, sqlx::Error> {
        let row: Option<SecretRow> = sqlx::query_as(
            r#"
            SELECT * FROM secrets
            WHERE project_id = $1 AND environment = $2 AND folder = $3 AND name = $4
            "#,
        )
        .bind(project_id)
        .bind(environment)
        .bind(folder)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Secret::try_from).transpose()
    }

    pub async fn list_secrets(
        &self,
        project_id: &str,
        environment: Option<&str>,
        folder: Option<&str>,
    ) -> Result<Vec<Secret>, sqlx::Error> {
        let rows: Vec<SecretRow> = sqlx::query_as(
            r#"
            SELECT * FROM secrets
            WHERE project_id = $1
              AND ($2 IS NULL OR environment = $2)
              AND ($3 IS NULL OR folder = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .bind(environment)
        .bind(folder)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Secret::try_from).collect()
    }

    pub async fn update_secret(&self, secret: &Secret) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE secrets
            SET name = $2, folder = $3, secret_type = $4, value = $5,
                description = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(&secret.id)
        .bind(&secret.name)
        .bind(&secret.folder)
        .bind(secret.secret_type.as_str())
        .bind(&secret.value)
        .bind(&secret.description)
        .bind(secret.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_secret(&self, id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM secrets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Move every secret under (project, environment, old_folder) to
    /// new_folder, all-or-nothing. A name collision in the target folder
    /// trips the unique index and rolls the whole rename back.
    pub async fn rename_folder(
        &self,
        project_id: &str,
        environment: &str,
        old_folder: &str,
        new_folder: &str,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE secrets
            SET folder = $4, updated_at = $5
            WHERE project_id = $1 AND environment = $2 AND folder = $3
            "#,
        )
        .bind(project_id)
        .bind(environment)
        .bind(old_folder)
        .bind(new_folder)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    // ==================== Access Token Operations ====================

    pub async fn insert_token(&self, token: &AccessToken) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens
                (id, name, token_hash, project_id, environment, folder, scopes,
                 created_at, expires_at, last_used_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&token.id)
        .bind(&token.name)
        .bind(&token.token_hash)
        .bind(&token.project_id)
        .bind(&token.environment)
        .bind(&token.folder)
        .bind(token.scopes_string())
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.last_used_at)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccessToken>, sqlx::Error> {
        let row: Option<TokenRow> =
            sqlx::query_as("SELECT * FROM access_tokens WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(AccessToken::from))
    }

    pub async fn find_token_by_id(&self, id: &str) -> Result<Option<AccessToken>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as("SELECT * FROM access_tokens WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AccessToken::from))
    }

    pub async fn list_tokens(&self, project_id: &str) -> Result<Vec<AccessToken>, sqlx::Error> {
        let rows: Vec<TokenRow> = sqlx::query_as(
            "SELECT * FROM access_tokens WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AccessToken::from).collect())
    }

    /// Set revoked_at if not already set. Idempotent by construction.
    pub async fn revoke_token(&self, id: &str, at: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE access_tokens SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn touch_token_last_used(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE access_tokens SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Audit Operations ====================

    pub async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_events
                (id, event_type, action, user_id, token_id, organization_id,
                 project_id, environment, folder, resource_name, description,
                 ip_address, user_agent, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&event.id)
        .bind(&event.event_type)
        .bind(&event.action)
        .bind(&event.user_id)
        .bind(&event.token_id)
        .bind(&event.organization_id)
        .bind(&event.project_id)
        .bind(&event.environment)
        .bind(&event.folder)
        .bind(&event.resource_name)
        .bind(&event.description)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn audit_by_folder(
        &self,
        project_id: &str,
        environment: &str,
        folder: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let rows: Vec<AuditEventRow> = sqlx::query_as(
            r#"
            SELECT * FROM audit_events
            WHERE project_id = $1 AND environment = $2 AND folder = $3
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(project_id)
        .bind(environment)
        .bind(folder)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuditEvent::from).collect())
    }

    pub async fn audit_recent(
        &self,
        organization_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let rows: Vec<AuditEventRow> = sqlx::query_as(
            r#"
            SELECT * FROM audit_events
            WHERE ($1 IS NULL OR organization_id = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(organization_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuditEvent::from).collect())
    }

    pub async fn audit_security(
        &self,
        organization_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let rows: Vec<AuditEventRow> = sqlx::query_as(
            r#"
            SELECT * FROM audit_events
            WHERE ($1 IS NULL OR organization_id = $1)
              AND (
                    (event_type = 'user_login' AND action = 'failed')
                 OR event_type = 'unauthorized_access'
                 OR event_type = 'suspicious_activity'
              )
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(organization_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuditEvent::from).collect())
    }

    // ==================== Device Code Operations ====================

    pub async fn insert_device_code(&self, code: &DeviceCode) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO device_codes
                (device_code, user_code, user_id, token_id, created_at,
                 expires_at, verified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&code.device_code)
        .bind(&code.user_code)
        .bind(&code.user_id)
        .bind(&code.token_id)
        .bind(code.created_at)
        .bind(code.expires_at)
        .bind(code.verified_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_device_code(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceCode>, sqlx::Error> {
        let row: Option<DeviceCodeRow> =
            sqlx::query_as("SELECT * FROM device_codes WHERE device_code = $1")
                .bind(device_code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(DeviceCode::from))
    }

    pub async fn find_device_code_by_user_code(
        &self,
        user_code: &str,
    ) -> Result<Option<DeviceCode>, sqlx::Error> {
        let row: Option<DeviceCodeRow> =
            sqlx::query_as("SELECT * FROM device_codes WHERE user_code = $1")
                .bind(user_code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(DeviceCode::from))
    }

    pub async fn mark_device_code_verified(
        &self,
        user_code: &str,
        user_id: Option<&str>,
        token_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE device_codes
            SET user_id = $2, token_id = $3, verified_at = $4
            WHERE user_code = $1
            "#,
        )
        .bind(user_code)
        .bind(user_id)
        .bind(token_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_device_code(&self, device_code: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM device_codes WHERE device_code = $1")
            .bind(device_code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_expired_device_codes(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM device_codes WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// True when a sqlx error is a unique-constraint violation (the loser of a
/// create race, or a folder-rename collision).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ==================== Row Types ====================

#[derive(sqlx::FromRow)]
struct SecretRow {
    id: String,
    project_id: String,
    environment: String,
    folder: String,
    name: String,
    secret_type: String,
    value: String,
    description: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SecretRow> for Secret {
    type Error = sqlx::Error;

    fn try_from(row: SecretRow) -> Result<Self, Self::Error> {
        let secret_type: SecretType = row
            .secret_type
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?;

        Ok(Secret {
            id: row.id,
            project_id: row.project_id,
            environment: row.environment,
            folder: row.folder,
            name: row.name,
            secret_type,
            value: row.value,
            description: row.description,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    name: Option<String>,
    token_hash: String,
    project_id: String,
    environment: Option<String>,
    folder: Option<String>,
    scopes: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for AccessToken {
    fn from(row: TokenRow) -> Self {
        AccessToken {
            id: row.id,
            name: row.name,
            token_hash: row.token_hash,
            project_id: row.project_id,
            environment: row.environment,
            folder: row.folder,
            scopes: AccessToken::parse_scopes(&row.scopes),
            created_at: row.created_at,
            expires_at: row.expires_at,
            last_used_at: row.last_used_at,
            revoked_at: row.revoked_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: String,
    event_type: String,
    action: String,
    user_id: Option<String>,
    token_id: Option<String>,
    organization_id: Option<String>,
    project_id: Option<String>,
    environment: Option<String>,
    folder: Option<String>,
    resource_name: Option<String>,
    description: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditEventRow> for AuditEvent {
    fn from(row: AuditEventRow) -> Self {
        AuditEvent {
            id: row.id,
            event_type: row.event_type,
            action: row.action,
            user_id: row.user_id,
            token_id: row.token_id,
            organization_id: row.organization_id,
            project_id: row.project_id,
            environment: row.environment,
            folder: row.folder,
            resource_name: row.resource_name,
            description: row.description,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeviceCodeRow {
    device_code: String,
    user_code: String,
    user_id: Option<String>,
    token_id: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

impl From<DeviceCodeRow> for DeviceCode {
    fn from(row: DeviceCodeRow) -> Self {
        DeviceCode {
            device_code: row.device_code,
            user_code: row.user_code,
            user_id: row.user_id,
            token_id: row.token_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            verified_at: row.verified_at,
        }
    }
}
