use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// Claims attendues dans les jetons émis par le service d'identité.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // ID utilisateur
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

pub fn validate_token(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized("Token is not valid".to_string()))?;

    Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AppError::Unauthorized("Token is not valid".to_string()))
}

/// Utilisateur authentifié par le header `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("No token, authorization denied".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))?;

        let user_id = validate_token(token, &state.config.jwt_secret)?;

        let user = state
            .users
            .get(&user_id)
            .map(|u| u.clone())
            .ok_or_else(|| AppError::Unauthorized("Token is not valid".to_string()))?;

        if !user.is_active {
            return Err(AppError::Unauthorized("Account is deactivated".to_string()));
        }

        Ok(AuthUser(user))
    }
}

/// Utilisateur authentifié avec le rôle admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AppError::Forbidden(
                "Access denied. Admin role required.".to_string(),
            ));
        }

        Ok(AdminUser(user))
    }
}
