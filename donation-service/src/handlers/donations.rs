//! Donation handlers: card checkout, provider webhook, and manual
//! bank-transfer submission.

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::{CheckoutRequest, CheckoutResponse, DonationResponse, SubmitResponse},
    services::reconciliation::BankTransferSubmission,
    AppState,
};

/// Initiate a card checkout for a campaign.
///
/// Returns the client secret the donor's browser uses to complete the
/// payment; the donation stays `PENDING` until the provider's webhook
/// confirms it.
pub async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    tracing::info!(
        campaign_id = %payload.campaign_id,
        amount = payload.amount,
        "Initiating card checkout"
    );

    let (donation, client_secret) = state
        .reconciliation
        .initiate_checkout(payload.campaign_id, payload.amount, payload.donor_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            donation_id: donation.id,
            client_secret,
        }),
    ))
}

/// Payment provider webhook.
///
/// The body is taken raw; signature verification happens before any
/// parsing. The provider retries delivery on its own schedule, so the
/// handler acknowledges with a minimal body and relies on the
/// reconciliation service's transition guard for replay safety.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok());

    state.reconciliation.process_webhook(&body, signature).await?;

    Ok(Json(json!({ "received": true })))
}

/// Submit a manual bank-transfer donation (multipart/form-data).
///
/// Fields: `campaignId`, `amount`, optional `transactionId`, optional
/// `donorName`/`donorEmail`, optional `receipt` screenshot file.
pub async fn submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let mut campaign_id: Option<Uuid> = None;
    let mut amount: Option<f64> = None;
    let mut transaction_id: Option<String> = None;
    let mut donor_name: Option<String> = None;
    let mut donor_email: Option<String> = None;
    let mut receipt: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Malformed multipart body: {}", e))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "campaignId" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Bad campaignId: {}", e)))?;
                campaign_id = Some(Uuid::parse_str(text.trim()).map_err(|_| {
                    AppError::BadRequest(anyhow::anyhow!("campaignId is not a valid id"))
                })?);
            }
            "amount" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Bad amount: {}", e)))?;
                amount = Some(text.trim().parse().map_err(|_| {
                    AppError::BadRequest(anyhow::anyhow!("amount is not a number"))
                })?);
            }
            "transactionId" => {
                transaction_id = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Bad transactionId: {}", e))
                })?);
            }
            "donorName" => {
                donor_name = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Bad donorName: {}", e))
                })?);
            }
            "donorEmail" => {
                donor_email = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Bad donorEmail: {}", e))
                })?);
            }
            "receipt" => {
                receipt = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            AppError::BadRequest(anyhow::anyhow!("Bad receipt upload: {}", e))
                        })?
                        .to_vec(),
                );
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let campaign_id = campaign_id
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("campaignId is required")))?;
    let amount =
        amount.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("amount is required")))?;

    tracing::info!(
        campaign_id = %campaign_id,
        amount,
        has_transaction_id = transaction_id.is_some(),
        has_receipt = receipt.is_some(),
        "Bank-transfer donation submitted"
    );

    let (donation, verified) = state
        .reconciliation
        .submit_bank_transfer(BankTransferSubmission {
            campaign_id,
            amount,
            transaction_id,
            receipt,
            donor_name,
            donor_email,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            donation_id: donation.id,
            verified,
        }),
    ))
}

/// Get a donation by id (for status checking).
pub async fn get_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
) -> Result<Json<DonationResponse>, AppError> {
    let donation = state
        .repository
        .get_donation(&donation_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Donation not found")))?;

    Ok(Json(DonationResponse::from(donation)))
}
