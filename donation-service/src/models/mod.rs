use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub goal_amount: f64,
    /// Only ever increased, and only through the reconciliation service's
    /// atomic increment. Never written read-modify-write.
    pub raised_amount: f64,
    pub status: CampaignStatus,
    /// Receiving bank account for manual transfer donations.
    pub bank_account: String,
    pub organizer_id: Uuid,
    pub is_success_story: bool,
    pub goal_reached_at: Option<DateTime>,
    pub featured: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    PendingVerification,
    Approved,
    Rejected,
    Paused,
}

impl CampaignStatus {
    /// Allowed transitions of the campaign workflow. Everything else is
    /// rejected as an invalid state change.
    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, PendingVerification)
                | (PendingVerification, Approved)
                | (PendingVerification, Rejected)
                | (Approved, Paused)
                | (Paused, Approved)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Donation {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub donor_id: Option<Uuid>,
    pub donor_name: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub provider: PaymentProvider,
    pub status: DonationStatus,
    /// Provider correlation id: payment-intent id for card donations,
    /// bank transaction id for transfers.
    pub provider_ref: Option<String>,
    pub verification: Option<VerificationRecord>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    Card,
    BankTransfer,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Pending,
    Succeeded,
    Failed,
}

impl DonationStatus {
    /// The donation state machine is forward-only: a pending donation
    /// settles or fails, and settled states never change again.
    pub fn can_transition_to(self, next: DonationStatus) -> bool {
        use DonationStatus::*;
        matches!((self, next), (Pending, Succeeded) | (Pending, Failed))
    }
}

/// How a bank transfer was verified, kept alongside the donation for audit.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationRecord {
    pub method: VerificationMethod,
    pub transaction_id: String,
    /// Raw response from the verification provider.
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationMethod {
    ManualEntry,
    ReceiptOcr,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Donor {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub total_donated: f64,
    pub donation_count: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Organizer-filed request for an admin-ratified campaign action.
///
/// The request has its own pending/approved/rejected machine, decoupled
/// from the campaign's: approving the request is what applies the action.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CampaignActionRequest {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub requested_by: Uuid,
    pub action: CampaignAction,
    pub reason: Option<String>,
    pub status: ActionRequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignAction {
    Pause,
    Resume,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_status_is_forward_only() {
        use DonationStatus::*;
        assert!(Pending.can_transition_to(Succeeded));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Succeeded.can_transition_to(Pending));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Succeeded));
    }

    #[test]
    fn campaign_workflow_transitions() {
        use CampaignStatus::*;
        assert!(Draft.can_transition_to(PendingVerification));
        assert!(PendingVerification.can_transition_to(Approved));
        assert!(PendingVerification.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Approved));

        assert!(!Draft.can_transition_to(Approved));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Draft));
        assert!(!Paused.can_transition_to(Rejected));
    }
}
