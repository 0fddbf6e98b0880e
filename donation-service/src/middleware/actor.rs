//! Actor context for role-gated endpoints.
//!
//! The API gateway authenticates the user and forwards identity as
//! `x-user-id` / `x-user-role` headers; token mechanics live entirely in
//! the gateway. This extractor only reads the forwarded identity.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Organizer,
    Donor,
}

impl Role {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "organizer" => Some(Role::Organizer),
            "donor" => Some(Role::Donor),
            _ => None,
        }
    }
}

/// Authenticated actor extracted from gateway headers.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl ActorContext {
    /// Reject the request unless the actor is an admin.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role != Role::Admin {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "admin role required for this action"
            )));
        }
        Ok(())
    }

    /// Reject the request unless the actor owns the given resource.
    pub fn require_owner(&self, owner_id: &Uuid) -> Result<(), AppError> {
        if &self.user_id != owner_id {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "only the owning organizer may perform this action"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing x-user-id header"))
            })?;

        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Malformed x-user-id header")))?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(Role::parse)
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing or unknown x-user-role header"))
            })?;

        Ok(ActorContext { user_id, role })
    }
}
