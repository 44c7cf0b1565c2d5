//! Identities (login credentials) and the JWT claims issued for them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// Role granting access to the administrative pages
pub const ADMIN_ROLE: &str = "Admin";

/// Stored credential record; linked one-to-one to a member
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
pub struct Identity {
    pub id: i32,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Self-registration request: credentials plus the member profile
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "The Email field is not a valid e-mail address."))]
    pub email: String,
    #[validate(length(min = 6, max = 100, message = "The Password must be between 6 and 100 characters."))]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub phone: String,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub identity_id: i32,
    pub member_id: Option<i32>,
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    /// Check if user holds the administrator role
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Member id the caller acts as, unless an admin names another one
    pub fn acting_member(&self, requested: Option<i32>) -> Result<i32, AppError> {
        match (requested, self.member_id) {
            (Some(id), _) if self.is_admin() => Ok(id),
            (Some(id), Some(own)) if id == own => Ok(own),
            (Some(_), _) => Err(AppError::Authorization(
                "Only administrators can act for another member".to_string(),
            )),
            (None, Some(own)) => Ok(own),
            (None, None) => Err(AppError::BadRequest(
                "No member profile is linked to this account".to_string(),
            )),
        }
    }
}
