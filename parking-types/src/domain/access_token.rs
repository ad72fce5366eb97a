//! Bearer access token domain type.

use chrono::{DateTime, Utc};

use super::ids::{AccessTokenId, UserId};

/// An issued bearer token. Only the SHA-256 hash of the raw token is kept.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub id: AccessTokenId,
    pub user_id: UserId,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(user_id: UserId, token_hash: String) -> Self {
        Self {
            id: AccessTokenId::new(),
            user_id,
            token_hash,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }
}
