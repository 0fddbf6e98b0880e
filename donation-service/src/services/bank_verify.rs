//! Bank-transfer verification provider client.
//!
//! Two concerns: recovering a transaction id from an uploaded receipt
//! screenshot (external OCR endpoint), and checking a transaction id
//! against the campaign's receiving account (verification endpoint).

use crate::config::BankVerifyConfig;
use anyhow::{anyhow, Result};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;

#[derive(Clone)]
pub struct BankVerifyClient {
    client: Client,
    config: BankVerifyConfig,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    transaction_id: &'a str,
    account_number: &'a str,
}

/// Outcome of a verification call.
///
/// `raw` is the provider's full response, persisted with the donation so
/// support staff can audit what was claimed and what was confirmed.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub verified: bool,
    /// Amount the provider confirmed for the transaction, when reported.
    pub amount: Option<f64>,
    /// Provider-supplied denial reason, when reported.
    pub reason: Option<String>,
    pub raw: serde_json::Value,
}

impl BankVerifyClient {
    pub fn new(config: BankVerifyConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if a verification endpoint is configured for this deployment.
    pub fn is_configured(&self) -> bool {
        !self.config.base_url.is_empty()
    }

    /// Recover a transaction id from a receipt screenshot.
    ///
    /// Returns `Ok(None)` when the image is unreadable or the OCR service
    /// cannot find a transaction id; the caller treats both the same way.
    pub async fn extract_transaction_id(&self, receipt: &[u8]) -> Result<Option<String>> {
        if self.config.ocr_url.is_empty() {
            return Err(anyhow!("OCR endpoint not configured"));
        }

        // Reject uploads that are not decodable images before paying for
        // an OCR round trip.
        if image::load_from_memory(receipt).is_err() {
            tracing::info!("Uploaded receipt is not a readable image");
            return Ok(None);
        }

        let part = reqwest::multipart::Part::bytes(receipt.to_vec())
            .file_name("receipt.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new().part("receipt", part);

        let response = self
            .client
            .post(&self.config.ocr_url)
            .header("x-api-key", self.config.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            tracing::warn!(status = %status, "OCR request failed");
            return Err(anyhow!("OCR request failed with status {}", status));
        }

        let transaction_id = body
            .get("transactionId")
            .or_else(|| body.get("transaction_id"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        tracing::info!(found = transaction_id.is_some(), "OCR extraction completed");
        Ok(transaction_id)
    }

    /// Verify a claimed transaction id against a receiving account.
    pub async fn verify_transaction(
        &self,
        transaction_id: &str,
        account_number: &str,
    ) -> Result<VerifyOutcome> {
        if !self.is_configured() {
            return Err(anyhow!("Bank verification endpoint not configured"));
        }

        let url = format!("{}/verify", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.expose_secret())
            .json(&VerifyRequest {
                transaction_id,
                account_number,
            })
            .send()
            .await?;

        let status = response.status();
        let raw: serde_json::Value = response
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);

        if !status.is_success() {
            tracing::warn!(status = %status, "Verification provider returned an error");
            return Err(anyhow!(
                "Verification provider error (status {})",
                status
            ));
        }

        let verified = raw
            .get("verified")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let amount = raw.get("amount").and_then(|v| v.as_f64());
        let reason = raw
            .get("reason")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        tracing::info!(
            transaction_id = %transaction_id,
            verified,
            "Bank transfer verification completed"
        );

        Ok(VerifyOutcome {
            verified,
            amount,
            reason,
            raw,
        })
    }
}
