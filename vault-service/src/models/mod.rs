pub mod access_token;
pub mod audit_event;
pub mod device_code;
pub mod secret;

pub use access_token::{AccessToken, AccessTokenResponse, TokenScope};
pub use audit_event::{AuditEvent, AuditEventResponse, Severity};
pub use device_code::DeviceCode;
pub use secret::{
    normalize_environment, normalize_folder, Secret, SecretResponse, SecretType, MASKED_VALUE,
};
