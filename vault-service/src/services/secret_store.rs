//! Encrypted secret storage.
//!
//! All writes encrypt before touching the database; reads return ciphertext
//! unless the caller explicitly asks for a reveal. Environment and folder
//! names are normalized here so every caller sees one canonical form.

use std::sync::Arc;

use crate::db::{self, Database};
use crate::models::{normalize_environment, normalize_folder, Secret, SecretType};

use super::crypto::SecretCipher;
use super::error::ServiceError;

/// Input for creating a secret. `value` is the plaintext.
#[derive(Debug)]
pub struct NewSecret {
    pub name: String,
    pub secret_type: SecretType,
    pub value: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

/// Partial update; `None` fields keep their stored value. Changing `name`
/// or `folder` moves the secret, subject to the same uniqueness rule as
/// create.
#[derive(Debug, Default)]
pub struct SecretUpdate {
    pub name: Option<String>,
    pub folder: Option<String>,
    pub value: Option<String>,
    pub secret_type: Option<SecretType>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct SecretStore {
    db: Database,
    cipher: Arc<SecretCipher>,
}

impl SecretStore {
    pub fn new(db: Database, cipher: Arc<SecretCipher>) -> Self {
        Self { db, cipher }
    }

    /// Create a secret at (project, environment, folder, name). The unique
    /// index arbitrates concurrent creates: exactly one wins, the rest see
    /// a conflict.
    pub async fn create_secret(
        &self,
        project_id: &str,
        environment: &str,
        folder: &str,
        input: NewSecret,
    ) -> Result<Secret, ServiceError> {
        let environment = normalize_environment(environment);
        let folder = normalize_folder(folder);

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Secret name must not be empty".to_string(),
            ));
        }

        let encrypted = self.cipher.encrypt(&input.value)?;
        let secret = Secret::new(
            project_id.to_string(),
            environment,
            folder,
            name,
            input.secret_type,
            encrypted,
            input.description,
            input.created_by,
        );

        match self.db.insert_secret(&secret).await {
            Ok(()) => Ok(secret),
            Err(e) if db::is_unique_violation(&e) => Err(ServiceError::SecretAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch a secret's record. The returned `value` is still the ciphertext
    /// envelope.
    pub async fn get_secret(
        &self,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
    ) -> Result<Secret, ServiceError> {
        let environment = normalize_environment(environment);
        let folder = normalize_folder(folder);

        self.db
            .find_secret(project_id, &environment, &folder, name)
            .await?
            .ok_or(ServiceError::SecretNotFound)
    }

    /// Fetch and decrypt a secret. Returns the record plus its plaintext.
    /// Callers are responsible for the corresponding secret_access audit
    /// event.
    pub async fn reveal_secret(
        &self,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
    ) -> Result<(Secret, String), ServiceError> {
        let secret = self
            .get_secret(project_id, environment, folder, name)
            .await?;
        let plaintext = self.cipher.decrypt(&secret.value)?;
        Ok((secret, plaintext))
    }

    pub async fn list_secrets(
        &self,
        project_id: &str,
        environment: Option<&str>,
        folder: Option<&str>,
    ) -> Result<Vec<Secret>, ServiceError> {
        let environment = environment.map(normalize_environment);
        let folder = folder.map(normalize_folder);

        Ok(self
            .db
            .list_secrets(project_id, environment.as_deref(), folder.as_deref())
            .await?)
    }

    /// Update a secret. Renaming it or moving it to another folder is
    /// subject to the same uniqueness rule as create.
    pub async fn update_secret(
        &self,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
        update: SecretUpdate,
    ) -> Result<Secret, ServiceError> {
        let mut secret = self
            .get_secret(project_id, environment, folder, name)
            .await?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Secret name must not be empty".to_string(),
                ));
            }
            secret.name = name;
        }
        if let Some(folder) = update.folder {
            secret.folder = normalize_folder(&folder);
        }
        if let Some(value) = update.value {
            secret.value = self.cipher.encrypt(&value)?;
        }
        if let Some(secret_type) = update.secret_type {
            secret.secret_type = secret_type;
        }
        if let Some(description) = update.description {
            secret.description = Some(description);
        }
        secret.updated_at = chrono::Utc::now();

        match self.db.update_secret(&secret).await {
            Ok(()) => Ok(secret),
            Err(e) if db::is_unique_violation(&e) => Err(ServiceError::SecretAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Hard delete. The audit trail is the only remaining record of the
    /// secret's existence.
    pub async fn delete_secret(
        &self,
        project_id: &str,
        environment: &str,
        folder: &str,
        name: &str,
    ) -> Result<Secret, ServiceError> {
        let secret = self
            .get_secret(project_id, environment, folder, name)
            .await?;

        let deleted = self.db.delete_secret(&secret.id).await?;
        if deleted == 0 {
            return Err(ServiceError::SecretNotFound);
        }
        Ok(secret)
    }

    /// Rename a folder, moving every secret in it atomically. Returns the
    /// number of secrets moved. A name collision in the target folder rolls
    /// the whole rename back.
    pub async fn rename_folder(
        &self,
        project_id: &str,
        environment: &str,
        old_folder: &str,
        new_folder: &str,
    ) -> Result<u64, ServiceError> {
        let environment = normalize_environment(environment);
        let old_folder = normalize_folder(old_folder);
        let new_folder = normalize_folder(new_folder);

        if old_folder == new_folder {
            return Err(ServiceError::ValidationError(
                "Old and new folder names are identical".to_string(),
            ));
        }

        match self
            .db
            .rename_folder(project_id, &environment, &old_folder, &new_folder)
            .await
        {
            Ok(moved) => Ok(moved),
            Err(e) if db::is_unique_violation(&e) => Err(ServiceError::SecretAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }
}
