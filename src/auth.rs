/// Authenticated admin identity for protected handlers
use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Admin identity established by the access-token gate
///
/// Inserted into request extensions by
/// [`require_access_token`](crate::api::middleware::require_access_token);
/// handlers take it as an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAdmin {
    pub username: String,
    /// Session identifier of the presented access token
    pub token_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedAdmin>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("unauthorized".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_extracts_from_extensions() {
        let admin = AuthenticatedAdmin {
            username: "alice".to_string(),
            token_id: Uuid::new_v4(),
        };
        let (mut parts, _) = Request::builder()
            .extension(admin.clone())
            .body(())
            .unwrap()
            .into_parts();

        let extracted = AuthenticatedAdmin::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(extracted, admin);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = AuthenticatedAdmin::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
