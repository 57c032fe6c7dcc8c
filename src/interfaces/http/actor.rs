//! Caller identity from gateway headers
//!
//! The gateway authenticates the caller and forwards `X-User-Id` and
//! `X-User-Role` (`user` or `admin`, default `user`).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::common::ApiResponse;
use crate::domain::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor yielding the authenticated [`Actor`].
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

fn reject(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(ApiResponse::<()>::error(message).with_code(code))).into_response()
}

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                reject(
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHENTICATED",
                    "Missing X-User-Id header",
                )
            })?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            None => Role::User,
            Some(v) => v.to_str().ok().and_then(Role::parse).ok_or_else(|| {
                reject(
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "X-User-Role must be 'user' or 'admin'",
                )
            })?,
        };

        Ok(CurrentActor(Actor::new(user_id, role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<Actor, StatusCode> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentActor::from_request_parts(&mut parts, &())
            .await
            .map(|CurrentActor(a)| a)
            .map_err(|r| r.status())
    }

    #[tokio::test]
    async fn user_role_is_the_default() {
        let actor = extract(&[("X-User-Id", "alice")]).await.unwrap();
        assert_eq!(actor, Actor::User("alice".into()));
    }

    #[tokio::test]
    async fn admin_role_is_case_insensitive() {
        let actor = extract(&[("X-User-Id", "ops"), ("X-User-Role", "Admin")])
            .await
            .unwrap();
        assert_eq!(actor, Actor::Admin("ops".into()));
    }

    #[tokio::test]
    async fn missing_or_blank_id_is_unauthorized() {
        assert_eq!(extract(&[]).await.unwrap_err(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            extract(&[("X-User-Id", "  ")]).await.unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        assert_eq!(
            extract(&[("X-User-Id", "alice"), ("X-User-Role", "root")])
                .await
                .unwrap_err(),
            StatusCode::BAD_REQUEST
        );
    }
}
