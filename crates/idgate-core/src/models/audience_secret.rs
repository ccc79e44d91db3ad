//! Per-audience signing secret.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deterministic audience string for a user.
///
/// Repeated lookups for the same user always land on the same secret row.
pub fn audience_for(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceSecret {
    pub audience: String,
    pub secret: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAudienceSecret {
    pub audience: String,
    pub secret: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_is_stable_per_user() {
        let id = Uuid::new_v4();
        assert_eq!(audience_for(id), audience_for(id));
        assert_eq!(audience_for(id), format!("user:{id}"));
    }
}
