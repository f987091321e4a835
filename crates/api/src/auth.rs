//! Caller identity asserted by the upstream authentication layer.
//!
//! Identity arrives as `x-user-id` (UUID) and `x-user-role`
//! (`customer`, `vendor` or `admin`; `customer` when absent).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::{Requester, Role, UserId};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Requester);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: UserId = header(parts, USER_ID_HEADER)?
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?
            .parse()
            .map_err(|_| {
                tracing::debug!("rejected malformed user id header");
                ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header"))
            })?;

        let role = match header(parts, USER_ROLE_HEADER)?.filter(|v| !v.is_empty()) {
            Some(value) => value
                .to_ascii_lowercase()
                .parse::<Role>()
                .map_err(|e| ApiError::Unauthorized(e.to_string()))?,
            None => Role::Customer,
        };

        Ok(Caller(Requester::new(user_id, role)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|v| v.to_str().map(str::trim))
        .transpose()
        .map_err(|_| ApiError::Unauthorized(format!("Invalid {name} header")))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(headers: &[(&str, &str)]) -> Result<Caller, ApiError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn role_defaults_to_customer() {
        let id = UserId::new();
        let header = id.to_string();
        let Caller(requester) = extract(&[(USER_ID_HEADER, header.as_str())]).await.unwrap();
        assert_eq!(requester.user_id, id);
        assert_eq!(requester.role, Role::Customer);
    }

    #[tokio::test]
    async fn reads_the_role_header() {
        let id = UserId::new().to_string();
        let headers = [(USER_ID_HEADER, id.as_str()), (USER_ROLE_HEADER, "Admin")];
        let Caller(requester) = extract(&headers).await.unwrap();
        assert!(requester.is_admin());
    }

    #[tokio::test]
    async fn missing_or_malformed_identity_is_rejected() {
        assert!(matches!(extract(&[]).await, Err(ApiError::Unauthorized(_))));
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "not-a-uuid")]).await,
            Err(ApiError::Unauthorized(_))
        ));
        let id = UserId::new().to_string();
        assert!(matches!(
            extract(&[(USER_ID_HEADER, id.as_str()), (USER_ROLE_HEADER, "root")]).await,
            Err(ApiError::Unauthorized(_))
        ));
    }
}
