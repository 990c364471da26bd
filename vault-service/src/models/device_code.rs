use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How long a pending device code stays redeemable.
pub const DEVICE_CODE_TTL_MINUTES: i64 = 10;

/// Suggested CLI polling interval, seconds.
pub const DEVICE_CODE_POLL_INTERVAL_SECS: u64 = 2;

// Excludes 0/O/1/I to keep the code easy to read back.
const USER_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A pending CLI authorization handshake. The CLI polls on `device_code`
/// while the user approves `user_code` in an authenticated browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub user_id: Option<String>,
    pub token_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl DeviceCode {
    pub fn new() -> Self {
        let now = Utc::now();
        let mut rng = rand::thread_rng();
        let raw: [u8; 32] = rng.gen();

        Self {
            device_code: format!("kv_dc_{}", hex::encode(raw)),
            user_code: generate_user_code(&mut rng),
            user_id: None,
            token_id: None,
            created_at: now,
            expires_at: now + Duration::minutes(DEVICE_CODE_TTL_MINUTES),
            verified_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }
}

impl Default for DeviceCode {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable approval code, e.g. "ABCD-2345".
fn generate_user_code(rng: &mut impl Rng) -> String {
    let mut parts = Vec::with_capacity(2);
    for _ in 0..2 {
        let part: String = (0..4)
            .map(|_| USER_CODE_ALPHABET[rng.gen_range(0..USER_CODE_ALPHABET.len())] as char)
            .collect();
        parts.push(part);
    }
    parts.join("-")
}
