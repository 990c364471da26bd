//! Services layer for vault-service.
//!
//! Encryption, storage, token issuance, scope enforcement, the audit
//! ledger, and the gateway that composes them.

pub mod audit_ledger;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod scope_enforcer;
pub mod secret_store;
pub mod token_authority;

pub use audit_ledger::AuditLedger;
pub use crypto::SecretCipher;
pub use error::ServiceError;
pub use gateway::{AccessGateway, RequestMeta};
pub use scope_enforcer::{AccessRequest, Deny};
pub use secret_store::{NewSecret, SecretStore, SecretUpdate};
pub use token_authority::{DevicePoll, Issuer, TokenAuthority, TokenGrant, CLI_PREFIX, PAT_PREFIX};
