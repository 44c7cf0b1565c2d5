//! Authentication service: registration, login and JWT issuance

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::rngs::OsRng;
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        identity::{NewIdentity, RegisterRequest, ADMIN_ROLE},
        member::{MemberInput, NewMember},
        Identity, Member, UserClaims,
    },
    repository::Repository,
    validation::{validate, FieldErrors},
};

/// Issued token with the identity it was issued for
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub email: String,
    pub roles: Vec<String>,
    pub member_id: Option<i32>,
}

/// Signed-in identity and its member profile
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountProfile {
    pub identity: Identity,
    pub member: Option<Member>,
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Create an identity and its member profile, then sign the new member in
    pub async fn register(&self, request: RegisterRequest) -> AppResult<LoginResponse> {
        let mut errors: FieldErrors = FieldErrors::new();
        if let Err(e) = request.validate() {
            for (field, field_errors) in e.field_errors() {
                if let Some(message) = field_errors.iter().find_map(|fe| fe.message.as_ref()) {
                    errors.insert(field.to_string(), message.to_string());
                }
            }
        }

        let email = request.email.trim().to_string();
        let member_input = MemberInput {
            first_name: request.first_name,
            last_name: request.last_name,
            address: request.address,
            email: Some(email.clone()),
            phone: request.phone,
            version: None,
        };
        if let Err(member_errors) = validate(&member_input) {
            for (field, message) in member_errors {
                errors.entry(field).or_insert(message);
            }
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        if self.repository.identity_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let identity = NewIdentity {
            email: email.clone(),
            password_hash: hash_password(&request.password)?,
            roles: Vec::new(),
        };
        let member = NewMember::from_input(member_input, email, None);
        let (identity, member) = self.repository.register_member(identity, member).await?;
        tracing::info!(
            "Account registered: identity id={} member id={}",
            identity.id,
            member.id
        );

        self.issue_token(&identity, Some(member.id))
    }

    /// Check credentials and issue a bearer token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        let identity = self
            .repository
            .identity_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(&identity, password)? {
            tracing::warn!("Failed login for identity {}", identity.id);
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        let member_id = self
            .repository
            .members_by_identity(identity.id)
            .await?
            .map(|m| m.id);
        tracing::info!("Identity {} signed in", identity.id);
        self.issue_token(&identity, member_id)
    }

    pub async fn profile(&self, claims: &UserClaims) -> AppResult<AccountProfile> {
        let identity = self
            .repository
            .identity_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Authentication("Account no longer exists".to_string()))?;
        let member = self.repository.members_by_identity(identity.id).await?;
        Ok(AccountProfile { identity, member })
    }

    /// Create the configured administrator identity when it does not exist yet
    pub async fn ensure_admin(&self) -> AppResult<()> {
        let (Some(email), Some(password)) = (
            self.config.admin_email.as_deref(),
            self.config.admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.repository.identity_by_email(email).await?.is_some() {
            tracing::debug!("Administrator account already present");
            return Ok(());
        }

        let identity = self
            .repository
            .insert_identity(NewIdentity {
                email: email.to_string(),
                password_hash: hash_password(password)?,
                roles: vec![ADMIN_ROLE.to_string()],
            })
            .await?;
        tracing::info!("Administrator account created: identity id={}", identity.id);
        Ok(())
    }

    fn issue_token(&self, identity: &Identity, member_id: Option<i32>) -> AppResult<LoginResponse> {
        let now = Utc::now().timestamp();
        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;

        let claims = UserClaims {
            sub: identity.email.clone(),
            identity_id: identity.id,
            member_id,
            roles: identity.roles.clone(),
            exp: now + expires_in,
            iat: now,
        };
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
            email: identity.email.clone(),
            roles: identity.roles.clone(),
            member_id,
        })
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(identity: &Identity, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&identity.password_hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
