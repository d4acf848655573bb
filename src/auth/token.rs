use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::scopes::Scope;

/// Leeway applied when checking expiry, so a token that dies mid-request
/// is treated as already expired.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Cached OAuth2 credential material plus the scope it was issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scope: Scope,
}

impl TokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }
}
