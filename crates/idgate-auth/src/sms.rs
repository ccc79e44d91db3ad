//! Outbound SMS delivery.

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// Delivers a text message to a phone number.
pub trait SmsSender: Send + Sync {
    fn send(
        &self,
        phone_number: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// Writes messages to the log instead of sending them. For development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSmsSender;

impl SmsSender for LogSmsSender {
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), AuthError> {
        info!(to = phone_number, message, "SMS (log only)");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SmsRequest<'a> {
    to: &'a str,
    message: &'a str,
}

/// POSTs `{"to": .., "message": ..}` as JSON to an SMS gateway.
#[derive(Debug, Clone)]
pub struct HttpSmsSender {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpSmsSender {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

impl SmsSender for HttpSmsSender {
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), AuthError> {
        let mut request = self.client.post(&self.url).json(&SmsRequest {
            to: phone_number,
            message,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::SmsDelivery(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body, "SMS gateway rejected message");
            return Err(AuthError::SmsDelivery(format!("gateway returned {status}")));
        }

        debug!(to = phone_number, "SMS handed to gateway");
        Ok(())
    }
}
