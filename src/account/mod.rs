/// Admin account management
///
/// Handles admin creation, credential checks and password changes. Session
/// tokens are issued by the token service, not here.

mod manager;

pub use manager::AccountManager;

use crate::db::models::Admin;
use crate::token::TokenPair;
use crate::validation::validate_alpha_num;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Admin creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAdminRequest {
    #[serde(default)]
    #[validate(length(min = 3, message = "The name field must be minimum 3 char"))]
    pub name: String,

    #[serde(default)]
    #[validate(
        length(min = 3, max = 16, message = "The username field must be between 3-16 char"),
        custom(function = "validate_alpha_num")
    )]
    pub username: String,

    #[serde(default)]
    #[validate(length(min = 8, max = 32, message = "The password field must be between 8-32 char"))]
    pub password: String,

    #[serde(default, rename = "profileImageUrl")]
    #[validate(url(message = "The profileImageUrl field format is invalid"))]
    pub profile_image_url: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(
        length(min = 3, max = 16, message = "The username field must be between 3-16 char"),
        custom(function = "validate_alpha_num")
    )]
    pub username: String,

    #[serde(default)]
    #[validate(length(min = 8, max = 32, message = "The password field must be between 8-32 char"))]
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[serde(default, rename = "refreshToken")]
    #[validate(length(min = 1, message = "The refreshToken field is required"))]
    pub refresh_token: String,
}

/// Password change request; `verify` must repeat `password`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[validate(length(min = 8, max = 32, message = "The password field must be between 8-32 char"))]
    pub password: String,

    #[serde(default)]
    #[validate(length(min = 8, max = 32, message = "The verify field must be between 8-32 char"))]
    pub verify: String,
}

/// Public profile returned alongside tokens
#[derive(Debug, Clone, Serialize)]
pub struct AdminProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    pub profile_image_url: String,
}

impl From<&Admin> for AdminProfile {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id.clone(),
            username: admin.username.clone(),
            name: admin.name.clone(),
            profile_image_url: admin.profile_image_url.clone(),
        }
    }
}

/// Login response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub data: AdminProfile,
    pub access_token: String,
    pub refresh_token: String,
}

impl LoginResponse {
    pub fn new(admin: &Admin, tokens: TokenPair) -> Self {
        Self {
            data: AdminProfile::from(admin),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}
