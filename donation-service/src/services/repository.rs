use crate::dtos::StatsResponse;
use crate::models::{
    ActionRequestStatus, Campaign, CampaignActionRequest, CampaignStatus, Donation, DonationStatus,
    Donor,
};
use anyhow::Result;
use futures::TryStreamExt;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{bson::doc, Collection, Database, IndexModel};
use uuid::Uuid;

#[derive(Clone)]
pub struct PlatformRepository {
    campaigns: Collection<Campaign>,
    donations: Collection<Donation>,
    donors: Collection<Donor>,
    action_requests: Collection<CampaignActionRequest>,
}

impl PlatformRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            campaigns: db.collection("campaigns"),
            donations: db.collection("donations"),
            donors: db.collection("donors"),
            action_requests: db.collection("campaign_action_requests"),
        }
    }

    /// Initialize database indexes.
    pub async fn init_indexes(&self) -> Result<()> {
        // Webhook settlement looks donations up by provider correlation id.
        let provider_ref_index = IndexModel::builder()
            .keys(doc! { "provider_ref": 1 })
            .options(
                IndexOptions::builder()
                    .name("donation_provider_ref_idx".to_string())
                    .sparse(true)
                    .build(),
            )
            .build();

        let campaign_donation_index = IndexModel::builder()
            .keys(doc! { "campaign_id": 1, "status": 1 })
            .options(
                IndexOptions::builder()
                    .name("donation_campaign_idx".to_string())
                    .build(),
            )
            .build();

        self.donations
            .create_indexes([provider_ref_index, campaign_donation_index], None)
            .await?;

        // Public listing filters approved campaigns by category.
        let listing_index = IndexModel::builder()
            .keys(doc! { "status": 1, "category": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("campaign_listing_idx".to_string())
                    .build(),
            )
            .build();

        self.campaigns.create_indexes([listing_index], None).await?;

        let donor_email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("donor_email_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.donors.create_indexes([donor_email_index], None).await?;

        tracing::info!("Donation service indexes initialized");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Campaigns
    // -----------------------------------------------------------------------

    pub async fn create_campaign(&self, campaign: Campaign) -> Result<()> {
        self.campaigns.insert_one(campaign, None).await?;
        Ok(())
    }

    pub async fn get_campaign(&self, id: &Uuid) -> Result<Option<Campaign>> {
        let filter = doc! { "_id": id.to_string() };
        Ok(self.campaigns.find_one(filter, None).await?)
    }

    /// Conditionally transition a campaign's status. Returns `false` when
    /// the campaign is not currently in `from`, which makes concurrent
    /// transitions race-free (last writer does not win, first one does).
    pub async fn transition_campaign(
        &self,
        id: &Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": id.to_string(),
            "status": mongodb::bson::to_bson(&from)?,
        };
        let update = doc! {
            "$set": {
                "status": mongodb::bson::to_bson(&to)?,
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        let result = self.campaigns.update_one(filter, update, None).await?;
        Ok(result.matched_count > 0)
    }

    pub async fn set_campaign_featured(&self, id: &Uuid, featured: bool) -> Result<()> {
        let filter = doc! { "_id": id.to_string() };
        let update = doc! {
            "$set": {
                "featured": featured,
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        self.campaigns.update_one(filter, update, None).await?;
        Ok(())
    }

    /// List approved campaigns, newest first, with optional category filter.
    pub async fn list_approved_campaigns(
        &self,
        page: u64,
        limit: i64,
        category: Option<&str>,
    ) -> Result<(Vec<Campaign>, i64)> {
        let mut filter = doc! {
            "status": mongodb::bson::to_bson(&CampaignStatus::Approved)?,
        };
        if let Some(category) = category {
            filter.insert("category", category);
        }

        let total_count = self
            .campaigns
            .count_documents(filter.clone(), None)
            .await? as i64;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.saturating_mul(limit.max(0) as u64))
            .limit(limit)
            .build();

        let cursor = self.campaigns.find(filter, Some(options)).await?;
        let campaigns: Vec<Campaign> = cursor.try_collect().await?;

        Ok((campaigns, total_count))
    }

    pub async fn list_featured_campaigns(&self, limit: i64) -> Result<Vec<Campaign>> {
        let filter = doc! {
            "status": mongodb::bson::to_bson(&CampaignStatus::Approved)?,
            "featured": true,
        };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .build();

        let cursor = self.campaigns.find(filter, Some(options)).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Atomically add a confirmed donation amount to the campaign total.
    ///
    /// `$inc` is the only writer of `raised_amount`, so concurrent
    /// settlements never lose an update. Returns the post-increment
    /// document, or `None` when the campaign no longer exists.
    pub async fn increment_raised(
        &self,
        campaign_id: &Uuid,
        amount: f64,
    ) -> Result<Option<Campaign>> {
        let filter = doc! { "_id": campaign_id.to_string() };
        let update = doc! {
            "$inc": { "raised_amount": amount },
            "$set": { "updated_at": mongodb::bson::DateTime::now() },
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .campaigns
            .find_one_and_update(filter, update, options)
            .await?)
    }

    /// Set the success flag and goal-reached timestamp, exactly once.
    ///
    /// The filter on `is_success_story: false` is the compare-and-swap:
    /// under concurrent goal-crossing donations only one update matches.
    pub async fn mark_goal_reached(&self, campaign_id: &Uuid) -> Result<bool> {
        let filter = doc! {
            "_id": campaign_id.to_string(),
            "is_success_story": false,
        };
        let update = doc! {
            "$set": {
                "is_success_story": true,
                "goal_reached_at": mongodb::bson::DateTime::now(),
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        let result = self.campaigns.update_one(filter, update, None).await?;
        Ok(result.modified_count > 0)
    }

    /// Delete a campaign and everything hanging off it. Donations go
    /// first so a failure cannot leave orphaned rows pointing at nothing.
    pub async fn delete_campaign_cascade(&self, campaign_id: &Uuid) -> Result<u64> {
        let donation_filter = doc! { "campaign_id": campaign_id.to_string() };
        let deleted = self.donations.delete_many(donation_filter, None).await?;

        self.action_requests
            .delete_many(doc! { "campaign_id": campaign_id.to_string() }, None)
            .await?;

        self.campaigns
            .delete_one(doc! { "_id": campaign_id.to_string() }, None)
            .await?;

        Ok(deleted.deleted_count)
    }

    // -----------------------------------------------------------------------
    // Donations
    // -----------------------------------------------------------------------

    pub async fn create_donation(&self, donation: Donation) -> Result<()> {
        self.donations.insert_one(donation, None).await?;
        Ok(())
    }

    pub async fn get_donation(&self, id: &Uuid) -> Result<Option<Donation>> {
        let filter = doc! { "_id": id.to_string() };
        Ok(self.donations.find_one(filter, None).await?)
    }

    pub async fn find_donation_by_provider_ref(
        &self,
        provider_ref: &str,
    ) -> Result<Option<Donation>> {
        let filter = doc! { "provider_ref": provider_ref };
        Ok(self.donations.find_one(filter, None).await?)
    }

    /// Conditionally transition the donation found by provider correlation
    /// id and return it post-transition.
    ///
    /// The `status: from` filter is the idempotency guard: a webhook replay
    /// for an already-settled donation matches nothing and returns `None`,
    /// so the campaign total is incremented exactly once per donation.
    pub async fn transition_donation_by_provider_ref(
        &self,
        provider_ref: &str,
        from: DonationStatus,
        to: DonationStatus,
    ) -> Result<Option<Donation>> {
        let filter = doc! {
            "provider_ref": provider_ref,
            "status": mongodb::bson::to_bson(&from)?,
        };
        let update = doc! {
            "$set": {
                "status": mongodb::bson::to_bson(&to)?,
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .donations
            .find_one_and_update(filter, update, options)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Donors
    // -----------------------------------------------------------------------

    pub async fn get_donor(&self, id: &Uuid) -> Result<Option<Donor>> {
        let filter = doc! { "_id": id.to_string() };
        Ok(self.donors.find_one(filter, None).await?)
    }

    pub async fn find_or_create_donor(&self, email: &str, name: &str) -> Result<Donor> {
        if let Some(donor) = self
            .donors
            .find_one(doc! { "email": email }, None)
            .await?
        {
            return Ok(donor);
        }

        let now = mongodb::bson::DateTime::now();
        let donor = Donor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            total_donated: 0.0,
            donation_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.donors.insert_one(donor.clone(), None).await?;
        Ok(donor)
    }

    /// Credit a donor's lifetime counters for a settled donation.
    pub async fn credit_donor(&self, donor_id: &Uuid, amount: f64) -> Result<()> {
        let filter = doc! { "_id": donor_id.to_string() };
        let update = doc! {
            "$inc": { "total_donated": amount, "donation_count": 1 },
            "$set": { "updated_at": mongodb::bson::DateTime::now() },
        };
        self.donors.update_one(filter, update, None).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Action requests
    // -----------------------------------------------------------------------

    pub async fn create_action_request(&self, request: CampaignActionRequest) -> Result<()> {
        self.action_requests.insert_one(request, None).await?;
        Ok(())
    }

    pub async fn get_action_request(&self, id: &Uuid) -> Result<Option<CampaignActionRequest>> {
        let filter = doc! { "_id": id.to_string() };
        Ok(self.action_requests.find_one(filter, None).await?)
    }

    /// Resolve a pending action request. Forward-only: a request already
    /// reviewed matches nothing and returns `None`.
    pub async fn resolve_action_request(
        &self,
        id: &Uuid,
        to: ActionRequestStatus,
        reviewed_by: &Uuid,
    ) -> Result<Option<CampaignActionRequest>> {
        let filter = doc! {
            "_id": id.to_string(),
            "status": mongodb::bson::to_bson(&ActionRequestStatus::Pending)?,
        };
        let update = doc! {
            "$set": {
                "status": mongodb::bson::to_bson(&to)?,
                "reviewed_by": reviewed_by.to_string(),
                "updated_at": mongodb::bson::DateTime::now(),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .action_requests
            .find_one_and_update(filter, update, options)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    /// Aggregate global platform stats. Callers memoize through the cache;
    /// this always reads the authoritative store.
    pub async fn global_stats(&self) -> Result<StatsResponse> {
        let pipeline = vec![doc! {
            "$group": {
                "_id": null,
                "total_campaigns": { "$sum": 1 },
                "total_raised": { "$sum": "$raised_amount" },
                "success_stories": {
                    "$sum": { "$cond": ["$is_success_story", 1, 0] }
                },
            }
        }];

        // $sum widens int32 to int64 on overflow, so read counters through
        // a type-tolerant accessor.
        fn get_count(d: &mongodb::bson::Document, key: &str) -> i64 {
            d.get_i64(key)
                .or_else(|_| d.get_i32(key).map(i64::from))
                .unwrap_or(0)
        }

        let mut cursor = self.campaigns.aggregate(pipeline, None).await?;
        let (total_campaigns, total_raised, success_stories) = match cursor.try_next().await? {
            Some(d) => (
                get_count(&d, "total_campaigns"),
                d.get_f64("total_raised").unwrap_or(0.0),
                get_count(&d, "success_stories"),
            ),
            None => (0, 0.0, 0),
        };

        let total_donations = self
            .donations
            .count_documents(
                doc! { "status": mongodb::bson::to_bson(&DonationStatus::Succeeded)? },
                None,
            )
            .await? as i64;

        Ok(StatsResponse {
            total_campaigns,
            total_raised,
            total_donations,
            success_stories,
        })
    }
}
