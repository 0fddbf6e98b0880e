//! Donation reconciliation service.
//!
//! The single place that turns a donor's payment attempt into durable
//! campaign-state changes. Both payment paths converge on
//! [`ReconciliationService::apply_settlement`]: one atomic increment of
//! the campaign total, a set-once goal flag, donor crediting, and cache
//! invalidation. The increment runs only after a donation's
//! `PENDING -> SUCCEEDED` transition matched, which is what makes webhook
//! replays and concurrent settlements safe.

use crate::models::{
    Donation, DonationStatus, PaymentProvider, VerificationMethod, VerificationRecord,
};
use crate::services::{
    metrics, BankVerifyClient, CampaignCache, PlatformRepository, StripeClient,
};
use crate::utils::{amounts_match, to_minor_units};
use mongodb::bson::DateTime;
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

/// Inputs of a manual bank-transfer submission.
#[derive(Debug)]
pub struct BankTransferSubmission {
    pub campaign_id: Uuid,
    pub amount: f64,
    /// Transaction id typed by the donor, if any.
    pub transaction_id: Option<String>,
    /// Receipt screenshot, when no transaction id was typed.
    pub receipt: Option<Vec<u8>>,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
}

#[derive(Clone)]
pub struct ReconciliationService {
    repository: PlatformRepository,
    stripe: StripeClient,
    bank_verify: BankVerifyClient,
    cache: CampaignCache,
    currency: String,
}

impl ReconciliationService {
    pub fn new(
        repository: PlatformRepository,
        stripe: StripeClient,
        bank_verify: BankVerifyClient,
        cache: CampaignCache,
        currency: String,
    ) -> Self {
        Self {
            repository,
            stripe,
            bank_verify,
            cache,
            currency,
        }
    }

    // -----------------------------------------------------------------------
    // Card path
    // -----------------------------------------------------------------------

    /// Initiate a card checkout: create a provider payment intent and a
    /// `PENDING` donation carrying its correlation id. No campaign
    /// mutation happens here; funds are not confirmed yet.
    pub async fn initiate_checkout(
        &self,
        campaign_id: Uuid,
        amount: f64,
        donor_id: Option<Uuid>,
    ) -> Result<(Donation, String), AppError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::InvalidAmount(anyhow::anyhow!(
                "donation amount must be a positive number"
            )));
        }
        if !self.stripe.is_configured() {
            return Err(AppError::ProviderUnavailable(
                "Card payments are not configured for this deployment".to_string(),
            ));
        }

        let campaign = self
            .repository
            .get_campaign(&campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;

        if campaign.status != crate::models::CampaignStatus::Approved {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "campaign is not accepting donations"
            )));
        }

        let donation_id = Uuid::new_v4();
        let intent = self
            .stripe
            .create_payment_intent(
                to_minor_units(amount),
                &self.currency,
                &donation_id.to_string(),
                &campaign_id.to_string(),
            )
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create payment intent");
                AppError::InternalError(anyhow::anyhow!("Failed to create payment intent"))
            })?;

        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Provider returned no client secret"))
        })?;

        let now = DateTime::now();
        let donation = Donation {
            id: donation_id,
            campaign_id,
            donor_id,
            donor_name: None,
            amount,
            currency: self.currency.clone(),
            provider: PaymentProvider::Card,
            status: DonationStatus::Pending,
            provider_ref: Some(intent.id.clone()),
            verification: None,
            created_at: now,
            updated_at: now,
        };
        self.repository.create_donation(donation.clone()).await?;

        metrics::record_donation("card", "pending");
        tracing::info!(
            donation_id = %donation.id,
            campaign_id = %campaign_id,
            intent_id = %intent.id,
            "Checkout initiated"
        );

        Ok((donation, client_secret))
    }

    /// Process a provider webhook. `body` must be the raw request body:
    /// nothing is parsed before the signature check passes.
    pub async fn process_webhook(
        &self,
        body: &str,
        signature_header: Option<&str>,
    ) -> Result<(), AppError> {
        if !self.stripe.is_configured() {
            return Err(AppError::ProviderUnavailable(
                "Card payments are not configured for this deployment".to_string(),
            ));
        }

        let signature = signature_header.ok_or(AppError::InvalidSignature)?;
        let is_valid = self
            .stripe
            .verify_webhook_signature(body, signature)
            .map_err(|e| {
                tracing::error!(error = %e, "Webhook signature verification error");
                AppError::InvalidSignature
            })?;
        if !is_valid {
            return Err(AppError::InvalidSignature);
        }

        let event = self.stripe.parse_webhook_event(body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse webhook event");
            AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
        })?;

        let intent_id = event.data.object.id.as_str();
        match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                self.settle_card_donation(intent_id).await?;
            }
            "payment_intent.payment_failed" => {
                let failed = self
                    .repository
                    .transition_donation_by_provider_ref(
                        intent_id,
                        DonationStatus::Pending,
                        DonationStatus::Failed,
                    )
                    .await?;
                if let Some(donation) = failed {
                    metrics::record_donation("card", "failed");
                    tracing::info!(
                        donation_id = %donation.id,
                        intent_id = %intent_id,
                        "Donation marked failed"
                    );
                }
            }
            other => {
                tracing::debug!(event_type = %other, "Unhandled webhook event type");
            }
        }

        Ok(())
    }

    /// Settle the donation matching a succeeded payment intent.
    ///
    /// The conditional transition is the idempotency guard: a replayed
    /// event matches no `PENDING` donation and changes nothing.
    async fn settle_card_donation(&self, intent_id: &str) -> Result<(), AppError> {
        let donation = self
            .repository
            .transition_donation_by_provider_ref(
                intent_id,
                DonationStatus::Pending,
                DonationStatus::Succeeded,
            )
            .await?;

        let Some(donation) = donation else {
            tracing::info!(
                intent_id = %intent_id,
                "No pending donation for intent (already settled or unknown)"
            );
            return Ok(());
        };

        metrics::record_donation("card", "succeeded");
        self.apply_settlement(&donation).await
    }

    // -----------------------------------------------------------------------
    // Bank-transfer path
    // -----------------------------------------------------------------------

    /// Verify and record a manual bank-transfer donation.
    ///
    /// Synchronous end to end: verification completes before the request
    /// returns, and the donation is created directly `SUCCEEDED`. A failed
    /// verification persists nothing.
    pub async fn submit_bank_transfer(
        &self,
        submission: BankTransferSubmission,
    ) -> Result<(Donation, serde_json::Value), AppError> {
        if !submission.amount.is_finite() || submission.amount <= 0.0 {
            return Err(AppError::InvalidAmount(anyhow::anyhow!(
                "donation amount must be a positive number"
            )));
        }
        if !self.bank_verify.is_configured() {
            return Err(AppError::ProviderUnavailable(
                "Bank-transfer verification is not configured for this deployment".to_string(),
            ));
        }

        let campaign = self
            .repository
            .get_campaign(&submission.campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;

        // Recover the transaction id: typed by the donor, or extracted
        // from the receipt. Extraction failure is terminal; there is no
        // fallback path.
        let (transaction_id, method) = match submission.transaction_id {
            Some(id) if !id.trim().is_empty() => {
                (id.trim().to_string(), VerificationMethod::ManualEntry)
            }
            _ => {
                let receipt = submission.receipt.as_deref().ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "either a transaction id or a receipt image is required"
                    ))
                })?;
                let extracted = self
                    .bank_verify
                    .extract_transaction_id(receipt)
                    .await
                    .map_err(|e| {
                        tracing::warn!(error = %e, "OCR extraction error");
                        AppError::ExtractionFailed(
                            "Could not read a transaction id from the receipt".to_string(),
                        )
                    })?;
                let Some(id) = extracted else {
                    return Err(AppError::ExtractionFailed(
                        "Could not read a transaction id from the receipt".to_string(),
                    ));
                };
                (id, VerificationMethod::ReceiptOcr)
            }
        };

        // A transaction id settles at most one donation.
        if self
            .repository
            .find_donation_by_provider_ref(&transaction_id)
            .await?
            .is_some()
        {
            return Err(AppError::VerificationFailed(
                "This transaction has already been claimed".to_string(),
            ));
        }

        let outcome = self
            .bank_verify
            .verify_transaction(&transaction_id, &campaign.bank_account)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Bank verification provider error");
                AppError::VerificationFailed("Unable to verify the transaction".to_string())
            })?;

        if !outcome.verified {
            return Err(AppError::VerificationFailed(
                outcome
                    .reason
                    .unwrap_or_else(|| "The transaction could not be verified".to_string()),
            ));
        }

        if let Some(confirmed) = outcome.amount {
            if !amounts_match(submission.amount, confirmed) {
                return Err(AppError::AmountMismatch {
                    claimed: submission.amount,
                    confirmed,
                });
            }
        }

        let donor_id = match submission.donor_email.as_deref() {
            Some(email) if !email.is_empty() => {
                let name = submission.donor_name.as_deref().unwrap_or("Anonymous");
                Some(self.repository.find_or_create_donor(email, name).await?.id)
            }
            _ => None,
        };

        let now = DateTime::now();
        let donation = Donation {
            id: Uuid::new_v4(),
            campaign_id: submission.campaign_id,
            donor_id,
            donor_name: submission.donor_name.clone(),
            amount: submission.amount,
            currency: self.currency.clone(),
            provider: PaymentProvider::BankTransfer,
            status: DonationStatus::Succeeded,
            provider_ref: Some(transaction_id.clone()),
            verification: Some(VerificationRecord {
                method,
                transaction_id,
                payload: outcome.raw.clone(),
            }),
            created_at: now,
            updated_at: now,
        };
        self.repository.create_donation(donation.clone()).await?;

        metrics::record_donation("bank_transfer", "succeeded");
        self.apply_settlement(&donation).await?;

        Ok((donation, outcome.raw))
    }

    // -----------------------------------------------------------------------
    // Shared settlement
    // -----------------------------------------------------------------------

    /// Apply a confirmed donation to campaign state.
    ///
    /// Callers guarantee the donation is `SUCCEEDED` and that this runs
    /// exactly once per donation. Cache and queue effects here are
    /// fire-and-forget; a failure in either leaves the money movement
    /// intact and is healed by TTL expiry.
    async fn apply_settlement(&self, donation: &Donation) -> Result<(), AppError> {
        let campaign = self
            .repository
            .increment_raised(&donation.campaign_id, donation.amount)
            .await?;

        let Some(campaign) = campaign else {
            tracing::warn!(
                donation_id = %donation.id,
                campaign_id = %donation.campaign_id,
                "Settled donation references a missing campaign"
            );
            return Ok(());
        };

        if campaign.raised_amount >= campaign.goal_amount
            && self.repository.mark_goal_reached(&campaign.id).await?
        {
            tracing::info!(
                campaign_id = %campaign.id,
                raised = campaign.raised_amount,
                goal = campaign.goal_amount,
                "Campaign reached its goal"
            );
        }

        if let Some(donor_id) = donation.donor_id {
            self.repository
                .credit_donor(&donor_id, donation.amount)
                .await?;
        }

        let provider = match donation.provider {
            PaymentProvider::Card => "card",
            PaymentProvider::BankTransfer => "bank_transfer",
        };
        metrics::record_donation_amount(
            provider,
            &donation.currency,
            to_minor_units(donation.amount).max(0) as u64,
        );

        self.cache.invalidate_donation_caches().await;
        self.cache
            .publish_event(&json!({
                "type": "donation.succeeded",
                "donationId": donation.id,
                "campaignId": donation.campaign_id,
                "amount": donation.amount,
                "currency": donation.currency,
                "provider": provider,
            }))
            .await;

        tracing::info!(
            donation_id = %donation.id,
            campaign_id = %campaign.id,
            amount = donation.amount,
            raised = campaign.raised_amount,
            "Donation settled"
        );

        Ok(())
    }
}
