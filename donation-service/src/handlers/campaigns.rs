//! Campaign handlers: organizer lifecycle, admin moderation, public reads.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::DateTime;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        ActionRequestResponse, CampaignListResponse, CampaignResponse, CreateActionRequest,
        CreateCampaignRequest, ListCampaignsParams, ReviewActionRequest, ReviewCampaignRequest,
    },
    middleware::{ActorContext, Role},
    models::{
        ActionRequestStatus, Campaign, CampaignAction, CampaignActionRequest, CampaignStatus,
    },
    services::cache::keys,
    AppState,
};

/// Create a campaign in `DRAFT` for the calling organizer.
pub async fn create_campaign(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), AppError> {
    if actor.role == Role::Donor {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "only verified organizers may create campaigns"
        )));
    }
    payload.validate()?;

    let now = DateTime::now();
    let campaign = Campaign {
        id: Uuid::new_v4(),
        title: payload.title,
        category: payload.category,
        description: payload.description,
        goal_amount: payload.goal_amount,
        raised_amount: 0.0,
        status: CampaignStatus::Draft,
        bank_account: payload.bank_account,
        organizer_id: actor.user_id,
        is_success_story: false,
        goal_reached_at: None,
        featured: false,
        created_at: now,
        updated_at: now,
    };

    state
        .repository
        .create_campaign(campaign.clone())
        .await
        .map_err(AppError::InternalError)?;

    tracing::info!(campaign_id = %campaign.id, organizer_id = %actor.user_id, "Campaign created");

    Ok((StatusCode::CREATED, Json(CampaignResponse::from(campaign))))
}

/// Public listing of approved campaigns, memoized in the cache.
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(params): Query<ListCampaignsParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let page = params.page.unwrap_or(0);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let category = params.category.as_deref();

    let cache_key = keys::campaign_list(page, limit, category);
    if let Some(cached) = state.cache.get(&cache_key).await {
        if let Ok(value) = serde_json::from_str(&cached) {
            return Ok(Json(value));
        }
    }

    let (campaigns, total_count) = state
        .repository
        .list_approved_campaigns(page, limit, category)
        .await
        .map_err(AppError::InternalError)?;

    let response = CampaignListResponse {
        campaigns: campaigns.into_iter().map(CampaignResponse::from).collect(),
        total_count,
        page,
        limit,
    };
    let value = serde_json::to_value(&response)
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

    state.cache.set(&cache_key, &value.to_string()).await;

    Ok(Json(value))
}

/// Featured campaigns for the landing page, memoized in the cache.
pub async fn featured_campaigns(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(cached) = state.cache.get(keys::CAMPAIGNS_FEATURED).await {
        if let Ok(value) = serde_json::from_str(&cached) {
            return Ok(Json(value));
        }
    }

    let campaigns = state
        .repository
        .list_featured_campaigns(10)
        .await
        .map_err(AppError::InternalError)?;

    let responses: Vec<CampaignResponse> =
        campaigns.into_iter().map(CampaignResponse::from).collect();
    let value = serde_json::to_value(&responses)
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

    state
        .cache
        .set(keys::CAMPAIGNS_FEATURED, &value.to_string())
        .await;

    Ok(Json(value))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, AppError> {
    let campaign = state
        .repository
        .get_campaign(&campaign_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Submit a draft campaign for admin verification.
pub async fn submit_campaign(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, AppError> {
    let campaign = state
        .repository
        .get_campaign(&campaign_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;

    if actor.role != Role::Admin {
        actor.require_owner(&campaign.organizer_id)?;
    }

    let moved = state
        .repository
        .transition_campaign(
            &campaign_id,
            CampaignStatus::Draft,
            CampaignStatus::PendingVerification,
        )
        .await
        .map_err(AppError::InternalError)?;
    if !moved {
        return Err(AppError::InvalidState(anyhow::anyhow!(
            "only a draft campaign can be submitted for verification"
        )));
    }

    let campaign = state
        .repository
        .get_campaign(&campaign_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;

    tracing::info!(campaign_id = %campaign_id, "Campaign submitted for verification");
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Admin review: approve or reject a pending campaign.
pub async fn review_campaign(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(campaign_id): Path<Uuid>,
    Json(payload): Json<ReviewCampaignRequest>,
) -> Result<Json<CampaignResponse>, AppError> {
    actor.require_admin()?;

    let target = if payload.approve {
        CampaignStatus::Approved
    } else {
        CampaignStatus::Rejected
    };

    let moved = state
        .repository
        .transition_campaign(&campaign_id, CampaignStatus::PendingVerification, target)
        .await
        .map_err(AppError::InternalError)?;
    if !moved {
        // Distinguish a missing campaign from one in the wrong state.
        let exists = state
            .repository
            .get_campaign(&campaign_id)
            .await
            .map_err(AppError::InternalError)?
            .is_some();
        if !exists {
            return Err(AppError::NotFound(anyhow::anyhow!("Campaign not found")));
        }
        return Err(AppError::InvalidState(anyhow::anyhow!(
            "campaign is not pending verification"
        )));
    }

    if payload.approve {
        if let Some(featured) = payload.featured {
            state
                .repository
                .set_campaign_featured(&campaign_id, featured)
                .await
                .map_err(AppError::InternalError)?;
        }
    }

    state.cache.invalidate_campaign_caches().await;

    let campaign = state
        .repository
        .get_campaign(&campaign_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;

    tracing::info!(
        campaign_id = %campaign_id,
        approved = payload.approve,
        reviewer = %actor.user_id,
        "Campaign reviewed"
    );
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Admin: pause an approved campaign.
pub async fn pause_campaign(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, AppError> {
    actor.require_admin()?;
    apply_campaign_action(&state, &campaign_id, CampaignAction::Pause).await?;
    state.cache.invalidate_campaign_caches().await;

    let campaign = state
        .repository
        .get_campaign(&campaign_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Admin: resume a paused campaign.
pub async fn resume_campaign(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, AppError> {
    actor.require_admin()?;
    apply_campaign_action(&state, &campaign_id, CampaignAction::Resume).await?;
    state.cache.invalidate_campaign_caches().await;

    let campaign = state
        .repository
        .get_campaign(&campaign_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;
    Ok(Json(CampaignResponse::from(campaign)))
}

/// Admin: delete a campaign and cascade to its donations.
pub async fn delete_campaign(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    actor.require_admin()?;

    let campaign = state
        .repository
        .get_campaign(&campaign_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;

    let deleted_donations = state
        .repository
        .delete_campaign_cascade(&campaign.id)
        .await
        .map_err(AppError::InternalError)?;

    // Raised totals left the platform, so stats caches go too.
    state.cache.invalidate_donation_caches().await;

    tracing::info!(
        campaign_id = %campaign_id,
        deleted_donations,
        "Campaign deleted with cascading donations"
    );

    Ok(Json(serde_json::json!({
        "deleted": true,
        "deletedDonations": deleted_donations,
    })))
}

/// Organizer: file a pause/resume request for an owned campaign.
pub async fn create_action_request(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(campaign_id): Path<Uuid>,
    Json(payload): Json<CreateActionRequest>,
) -> Result<(StatusCode, Json<ActionRequestResponse>), AppError> {
    let campaign = state
        .repository
        .get_campaign(&campaign_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign not found")))?;

    actor.require_owner(&campaign.organizer_id)?;

    let expected = match payload.action {
        CampaignAction::Pause => CampaignStatus::Approved,
        CampaignAction::Resume => CampaignStatus::Paused,
    };
    if campaign.status != expected {
        return Err(AppError::InvalidState(anyhow::anyhow!(
            "campaign state does not allow this action request"
        )));
    }

    let now = DateTime::now();
    let request = CampaignActionRequest {
        id: Uuid::new_v4(),
        campaign_id,
        requested_by: actor.user_id,
        action: payload.action,
        reason: payload.reason,
        status: ActionRequestStatus::Pending,
        reviewed_by: None,
        created_at: now,
        updated_at: now,
    };

    state
        .repository
        .create_action_request(request.clone())
        .await
        .map_err(AppError::InternalError)?;

    tracing::info!(
        request_id = %request.id,
        campaign_id = %campaign_id,
        action = ?request.action,
        "Action request filed"
    );

    Ok((
        StatusCode::CREATED,
        Json(ActionRequestResponse::from(request)),
    ))
}

/// Admin: ratify or reject a pending action request. Approval applies
/// the requested action to the campaign.
pub async fn review_action_request(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ReviewActionRequest>,
) -> Result<Json<ActionRequestResponse>, AppError> {
    actor.require_admin()?;

    if state
        .repository
        .get_action_request(&request_id)
        .await
        .map_err(AppError::InternalError)?
        .is_none()
    {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Action request not found"
        )));
    }

    let target = if payload.approve {
        ActionRequestStatus::Approved
    } else {
        ActionRequestStatus::Rejected
    };

    let request = state
        .repository
        .resolve_action_request(&request_id, target, &actor.user_id)
        .await
        .map_err(AppError::InternalError)?
        .ok_or_else(|| {
            AppError::InvalidState(anyhow::anyhow!("action request was already reviewed"))
        })?;

    if payload.approve {
        let applied = apply_campaign_action(&state, &request.campaign_id, request.action).await;
        match applied {
            Ok(()) => state.cache.invalidate_campaign_caches().await,
            Err(AppError::InvalidState(_)) => {
                // Campaign moved since the request was filed; the request
                // stays approved but there is nothing to apply.
                tracing::warn!(
                    request_id = %request_id,
                    campaign_id = %request.campaign_id,
                    "Approved action request no longer applicable"
                );
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        request_id = %request_id,
        approved = payload.approve,
        reviewer = %actor.user_id,
        "Action request reviewed"
    );

    Ok(Json(ActionRequestResponse::from(request)))
}

/// Global platform stats, memoized in the cache.
pub async fn global_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(cached) = state.cache.get(keys::STATS_GLOBAL).await {
        if let Ok(value) = serde_json::from_str(&cached) {
            return Ok(Json(value));
        }
    }

    let stats = state
        .repository
        .global_stats()
        .await
        .map_err(AppError::InternalError)?;
    let value = serde_json::to_value(&stats)
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

    state.cache.set(keys::STATS_GLOBAL, &value.to_string()).await;

    Ok(Json(value))
}

/// Apply a pause/resume action through the campaign state machine.
async fn apply_campaign_action(
    state: &AppState,
    campaign_id: &Uuid,
    action: CampaignAction,
) -> Result<(), AppError> {
    let (from, to) = match action {
        CampaignAction::Pause => (CampaignStatus::Approved, CampaignStatus::Paused),
        CampaignAction::Resume => (CampaignStatus::Paused, CampaignStatus::Approved),
    };

    let moved = state
        .repository
        .transition_campaign(campaign_id, from, to)
        .await
        .map_err(AppError::InternalError)?;
    if !moved {
        let exists = state
            .repository
            .get_campaign(campaign_id)
            .await
            .map_err(AppError::InternalError)?
            .is_some();
        if !exists {
            return Err(AppError::NotFound(anyhow::anyhow!("Campaign not found")));
        }
        return Err(AppError::InvalidState(anyhow::anyhow!(
            "campaign state does not allow this action"
        )));
    }
    Ok(())
}
