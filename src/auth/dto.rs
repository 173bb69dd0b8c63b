use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Profile, User};

/// Request body for signup. Role-specific fields are optional here and checked against
/// the chosen role by the service.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    #[serde(alias = "farmSize")]
    pub farm_size: Option<f64>,
    pub crops: Option<String>,
    #[serde(alias = "droughtImpact")]
    pub drought_impact: Option<String>,
    #[serde(alias = "organizationName")]
    pub organization_name: Option<String>,
    #[serde(alias = "contactPerson")]
    pub contact_person: Option<String>,
    #[serde(alias = "organizationType")]
    pub organization_type: Option<String>,
    #[serde(alias = "focusAreas")]
    pub focus_areas: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmEmailRequest {
    pub email: String,
    pub code: String,
}

/// Body of the endpoints that only need an address.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

/// Returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// The client-facing view of an account. Carries no credential material.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub confirmed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Emits `role` plus the role's own fields.
    #[serde(flatten)]
    pub profile: Profile,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            confirmed: u.confirmed,
            created_at: u.created_at,
            profile: u.profile,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfirmedResponse {
    pub confirmed: bool,
}
