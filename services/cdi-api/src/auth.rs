//! Bearer-token identity.
//!
//! Clients send `Authorization: Bearer <api_token>`; the token is looked up in
//! the `users` table. A missing or unknown token is a 401, a user with the
//! wrong role a 403.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use cdi_common::CdiError;
use storage::{Role, User};

use crate::error::ApiError;
use crate::state::AppState;

/// Any authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// A user with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// A user with the reviewer role.
#[derive(Debug, Clone)]
pub struct ReviewerUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let app = parts
            .extensions
            .get::<Arc<AppState>>()
            .cloned()
            .ok_or_else(|| CdiError::InternalError("application state missing".into()))?;

        let token = bearer_token(parts).ok_or(CdiError::Unauthenticated)?;
        let user = app
            .store
            .find_user_by_token(token)
            .await?
            .ok_or(CdiError::Unauthenticated)?;
        Ok(CurrentUser(user))
    }
}

async fn user_with_role<S: Send + Sync>(parts: &mut Parts, state: &S, role: Role) -> Result<User, ApiError> {
    let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
    if user.role != role {
        return Err(CdiError::Forbidden.into());
    }
    Ok(user)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        user_with_role(parts, state, Role::Admin).await.map(AdminUser)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ReviewerUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        user_with_role(parts, state, Role::Reviewer).await.map(ReviewerUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("bearer  abc123 "))), Some("abc123"));
        assert_eq!(bearer_token(&parts(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
