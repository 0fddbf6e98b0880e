//! Card payment provider client (Stripe Payment Intents API).
//!
//! Implements payment-intent creation for checkout initiation and
//! `Stripe-Signature` verification for webhook events.

use crate::config::StripeConfig;
use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::utils::signature::{hmac_sha256_hex, signatures_match};

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

/// Payment intent as returned by the provider.
#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Secret handed to the donor's browser to complete payment.
    pub client_secret: Option<String>,
    /// Amount in smallest currency unit.
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

/// Provider API error response.
#[derive(Debug, Deserialize)]
pub struct StripeError {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Webhook event envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookObject,
}

/// The event's payload object; for `payment_intent.*` events this is the
/// intent itself. Only the fields the reconciliation flow reads.
#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    pub id: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<String>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if the card provider is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
            && !self.config.webhook_secret.expose_secret().is_empty()
    }

    /// Create a payment intent for a checkout.
    ///
    /// # Arguments
    /// * `amount_minor` - Amount in smallest currency unit (cents)
    /// * `currency` - Currency code (e.g., "usd")
    /// * `donation_id` / `campaign_id` - attached as metadata for support
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        donation_id: &str,
        campaign_id: &str,
    ) -> Result<PaymentIntent> {
        if !self.is_configured() {
            return Err(anyhow!("Card provider credentials not configured"));
        }

        let url = format!("{}/payment_intents", self.config.api_base_url);
        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[donation_id]", donation_id.to_string()),
            ("metadata[campaign_id]", campaign_id.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, "Payment intent response received");

        if status.is_success() {
            let intent: PaymentIntent = serde_json::from_str(&body)?;
            tracing::info!(
                intent_id = %intent.id,
                amount = intent.amount,
                currency = %intent.currency,
                "Payment intent created"
            );
            Ok(intent)
        } else {
            let error: StripeError = serde_json::from_str(&body).unwrap_or_else(|_| StripeError {
                error: StripeErrorDetail {
                    error_type: "api_error".to_string(),
                    code: None,
                    message: Some(body.clone()),
                },
            });
            tracing::error!(
                error_type = %error.error.error_type,
                code = ?error.error.code,
                "Payment intent creation failed"
            );
            Err(anyhow!(
                "Card provider error: {} - {}",
                error.error.error_type,
                error.error.message.unwrap_or_default()
            ))
        }
    }

    /// Verify the `Stripe-Signature` header against the raw webhook body.
    ///
    /// The header carries `t=<unix ts>,v1=<hex sig>[,v1=...]`; the signed
    /// payload is `"{t}.{body}"` and the signature is HMAC-SHA256 with the
    /// webhook signing secret. Timestamps outside the tolerance window are
    /// rejected to stop replay of captured events.
    pub fn verify_webhook_signature(&self, body: &str, header: &str) -> Result<bool> {
        self.verify_webhook_signature_at(body, header, Utc::now().timestamp())
    }

    fn verify_webhook_signature_at(&self, body: &str, header: &str, now: i64) -> Result<bool> {
        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let (Some(timestamp), false) = (timestamp, candidates.is_empty()) else {
            tracing::warn!("Malformed webhook signature header");
            return Ok(false);
        };

        if (now - timestamp).abs() > self.config.signature_tolerance_secs {
            tracing::warn!(timestamp, "Webhook signature timestamp outside tolerance");
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp, body);
        let expected = hmac_sha256_hex(
            self.config.webhook_secret.expose_secret(),
            &signed_payload,
        )?;

        let is_valid = candidates
            .iter()
            .any(|candidate| signatures_match(&expected, candidate));

        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }

    /// Compute a signature header for a body, as the provider would.
    /// Used by tests to produce valid webhook requests.
    pub fn sign_webhook_payload(&self, body: &str, timestamp: i64) -> Result<String> {
        let signed_payload = format!("{}.{}", timestamp, body);
        let signature = hmac_sha256_hex(
            self.config.webhook_secret.expose_secret(),
            &signed_payload,
        )?;
        Ok(format!("t={},v1={}", timestamp, signature))
    }

    /// Parse a webhook event from the (already verified) body.
    pub fn parse_webhook_event(&self, body: &str) -> Result<WebhookEvent> {
        let event: WebhookEvent = serde_json::from_str(body)?;
        Ok(event)
    }
}
