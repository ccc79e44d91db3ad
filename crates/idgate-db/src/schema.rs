//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as strings and every
//! natural key carries a UNIQUE index, which is what the repositories
//! rely on to detect concurrent inserts.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "identity_and_tokens",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD phone_number ON TABLE user TYPE string;
DEFINE FIELD nickname ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD is_email_verified ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD email_confirmation_code ON TABLE user TYPE string;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_phone_number ON TABLE user \
    COLUMNS phone_number UNIQUE;
DEFINE INDEX idx_user_confirmation_code ON TABLE user \
    COLUMNS email_confirmation_code UNIQUE;

-- =======================================================================
-- Per-audience signing secrets (base64)
-- =======================================================================
DEFINE TABLE audience_secret SCHEMAFULL;
DEFINE FIELD audience ON TABLE audience_secret TYPE string;
DEFINE FIELD secret ON TABLE audience_secret TYPE string;
DEFINE FIELD created_at ON TABLE audience_secret TYPE datetime;
DEFINE INDEX idx_audience_secret_audience ON TABLE audience_secret \
    COLUMNS audience UNIQUE;

-- =======================================================================
-- Refresh token denylist (append-only)
-- =======================================================================
DEFINE TABLE revoked_token SCHEMAFULL;
DEFINE FIELD jti ON TABLE revoked_token TYPE string;
DEFINE FIELD user_id ON TABLE revoked_token TYPE string;
DEFINE FIELD created_at ON TABLE revoked_token TYPE datetime;
DEFINE INDEX idx_revoked_token_jti ON TABLE revoked_token \
    COLUMNS jti UNIQUE;

-- =======================================================================
-- SMS OTP verifications (record id = verification token)
-- =======================================================================
DEFINE TABLE otp_verification SCHEMAFULL;
DEFINE FIELD phone_number ON TABLE otp_verification TYPE string;
DEFINE FIELD otp_code ON TABLE otp_verification TYPE string;
DEFINE FIELD expires_at ON TABLE otp_verification TYPE datetime;
DEFINE FIELD trials ON TABLE otp_verification TYPE int DEFAULT 0 \
    ASSERT $value >= 0;
DEFINE FIELD valid_until ON TABLE otp_verification \
    TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE otp_verification TYPE datetime;
DEFINE INDEX idx_otp_verification_phone ON TABLE otp_verification \
    COLUMNS phone_number;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

async fn current_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current = current_version(db).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
