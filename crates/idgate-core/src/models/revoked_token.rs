//! Refresh-token denylist entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedToken {
    pub jti: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
