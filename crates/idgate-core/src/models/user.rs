//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// E.164 formatted.
    pub phone_number: String,
    pub nickname: String,
    pub password_hash: String,
    pub is_email_verified: bool,
    /// Opaque code the owner presents to confirm their email address.
    pub email_confirmation_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub nickname: String,
    /// Already hashed by the caller.
    pub password_hash: String,
    pub email_confirmation_code: String,
}
