use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use futures_util::future::{ready, LocalBoxFuture};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Id, User};
use crate::repo::{Repo, RepoError, UserRepo};
use crate::routes::AppState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
    pub roles: Vec<Role>,
}

impl Claims {
    /// Numeric user id from a `user:<id>` subject.
    pub fn user_id(&self) -> Option<Id> {
        self.sub.strip_prefix("user:").and_then(|id| id.parse().ok())
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

pub fn roles_for(user: &User) -> Vec<Role> {
    if user.is_staff || user.is_superuser { vec![Role::Admin] } else { vec![Role::User] }
}

/// Validate a JWT and return its claims.
pub fn decode_jwt(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Issue a 24 hour token for a user.
pub fn create_jwt(secret: &str, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize;
    let claims = Claims {
        sub: format!("user:{}", user.id),
        email: user.email.clone(),
        exp: expiration,
        roles: roles_for(user),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Load the account behind a token. Removed or deactivated accounts are refused.
pub async fn active_user(repo: &dyn Repo, claims: &Claims) -> Result<User, ApiError> {
    let id = claims.user_id().ok_or(ApiError::Unauthorized)?;
    match repo.get_user(id).await {
        Ok(user) if user.is_active => Ok(user),
        Ok(user) => {
            log::warn!("rejected token of inactive account {}", user.email);
            Err(ApiError::Forbidden)
        }
        Err(RepoError::NotFound) => Err(ApiError::Forbidden),
        Err(e) => Err(e.into()),
    }
}

/// Extractor yielding validated `Claims` of an active account.
/// Roles come from the stored account, not from the token.
pub struct Auth(pub Claims);

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
            log::error!("Auth extractor used without AppState");
            return Box::pin(ready(Err(ApiError::Internal)));
        };
        // Delegate to BearerAuth to parse the header.
        let claims = match BearerAuth::from_request(req, pl).into_inner() {
            Ok(bearer) => decode_jwt(&state.config.secret_key, bearer.token()).map_err(|_| ApiError::Unauthorized),
            Err(_) => Err(ApiError::Unauthorized),
        };
        Box::pin(async move {
            let mut claims = claims?;
            let user = active_user(state.repo.as_ref(), &claims).await?;
            claims.roles = roles_for(&user);
            Ok(Auth(claims))
        })
    }
}

/// Helper macro for role-guarding handlers.
#[macro_export]
macro_rules! require_role {
    ($auth:expr, $role:pat) => {
        if !$auth.0.roles.iter().any(|r| matches!(r, $role)) {
            return Err(From::from($crate::error::ApiError::Forbidden));
        }
    };
}
