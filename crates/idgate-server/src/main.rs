//! idgate server: loads settings, connects storage and wires the
//! identity services.

mod settings;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use idgate_auth::{
    Argon2Hasher, AuthConfig, HttpSmsSender, IdentityService, LogSmsSender, OtpEngine, SmsSender,
    TokenService,
};
use idgate_core::clock::{Clock, SystemClock};
use idgate_db::{DbManager, Repositories};
use surrealdb::engine::remote::ws::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("idgate=info")),
        )
        .json()
        .init();

    let settings = Settings::parse();
    info!("Starting idgate server...");

    let db = DbManager::connect(&settings.db_config())
        .await
        .context("connecting to SurrealDB")?;
    db.migrate().await.context("running migrations")?;

    let repos = db.repositories();
    let config = settings.auth_config();

    match &settings.sms_gateway_url {
        Some(url) => {
            info!(%url, "SMS gateway configured");
            let sms = HttpSmsSender::new(url.clone(), settings.sms_gateway_key.clone());
            serve(repos, sms, config).await
        }
        None => {
            info!("No SMS gateway configured, messages are logged only");
            serve(repos, LogSmsSender, config).await
        }
    }
}

async fn serve<M: SmsSender>(
    repos: Repositories<Client>,
    sms: M,
    config: AuthConfig,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let tokens = TokenService::new(
        repos.users.clone(),
        repos.audience_secrets,
        repos.revoked_tokens,
        clock.clone(),
        config.clone(),
    );
    let otp = OtpEngine::new(repos.otp_verifications, sms, clock, config.clone());
    let _identity = IdentityService::new(
        repos.users,
        tokens,
        otp,
        Argon2Hasher::new(config.pepper.clone()),
    );

    info!(issuer = %config.issuer, "Identity services ready");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    info!("idgate server stopped.");
    Ok(())
}
