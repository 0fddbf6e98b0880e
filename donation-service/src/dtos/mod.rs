//! Request/response DTOs for the public API.
//!
//! The wire format is camelCase; internal models stay snake_case.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    ActionRequestStatus, Campaign, CampaignAction, CampaignActionRequest, CampaignStatus, Donation,
    DonationStatus, PaymentProvider,
};

// ---------------------------------------------------------------------------
// Donations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub campaign_id: Uuid,
    pub amount: f64,
    pub donor_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub donation_id: Uuid,
    /// Client secret the donor's browser uses to complete the payment.
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub donation_id: Uuid,
    /// Verification payload as returned by the provider.
    pub verified: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationResponse {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub donor_id: Option<Uuid>,
    pub donor_name: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub provider: PaymentProvider,
    pub status: DonationStatus,
    pub provider_ref: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Donation> for DonationResponse {
    fn from(d: Donation) -> Self {
        Self {
            id: d.id,
            campaign_id: d.campaign_id,
            donor_id: d.donor_id,
            donor_name: d.donor_name,
            amount: d.amount,
            currency: d.currency,
            provider: d.provider,
            status: d.status,
            provider_ref: d.provider_ref,
            created_at: d.created_at.to_string(),
            updated_at: d.updated_at.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Campaigns
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    #[validate(length(min = 3, max = 120))]
    pub title: String,
    #[validate(length(min = 2, max = 60))]
    pub category: String,
    #[validate(length(min = 10))]
    pub description: String,
    #[validate(range(min = 0.01))]
    pub goal_amount: f64,
    #[validate(length(min = 4, max = 64))]
    pub bank_account: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResponse {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub goal_amount: f64,
    pub raised_amount: f64,
    pub status: CampaignStatus,
    pub bank_account: String,
    pub organizer_id: Uuid,
    pub is_success_story: bool,
    pub goal_reached_at: Option<String>,
    pub featured: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            title: c.title,
            category: c.category,
            description: c.description,
            goal_amount: c.goal_amount,
            raised_amount: c.raised_amount,
            status: c.status,
            bank_account: c.bank_account,
            organizer_id: c.organizer_id,
            is_success_story: c.is_success_story,
            goal_reached_at: c.goal_reached_at.map(|t| t.to_string()),
            featured: c.featured,
            created_at: c.created_at.to_string(),
            updated_at: c.updated_at.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCampaignsParams {
    pub page: Option<u64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignListResponse {
    pub campaigns: Vec<CampaignResponse>,
    pub total_count: i64,
    pub page: u64,
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCampaignRequest {
    pub approve: bool,
    /// Optionally feature the campaign on approval.
    pub featured: Option<bool>,
}

// ---------------------------------------------------------------------------
// Action requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionRequest {
    pub action: CampaignAction,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewActionRequest {
    pub approve: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequestResponse {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub requested_by: Uuid,
    pub action: CampaignAction,
    pub reason: Option<String>,
    pub status: ActionRequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CampaignActionRequest> for ActionRequestResponse {
    fn from(r: CampaignActionRequest) -> Self {
        Self {
            id: r.id,
            campaign_id: r.campaign_id,
            requested_by: r.requested_by,
            action: r.action,
            reason: r.reason,
            status: r.status,
            reviewed_by: r.reviewed_by,
            created_at: r.created_at.to_string(),
            updated_at: r.updated_at.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Global platform stats. Serialized into the cache, so it derives both.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_campaigns: i64,
    pub total_raised: f64,
    pub total_donations: i64,
    pub success_stories: i64,
}
