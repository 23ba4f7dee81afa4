use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

use super::claims;
use crate::state::AppState;

/// Extracts and validates a Supabase-issued JWT, returning the user ID.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let cfg = &state.config.jwt;
        let decoded = claims::decode_user(token, &cfg.secret, &cfg.audience)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid or expired token".to_string()))?;

        let sub = decoded
            .sub
            .ok_or((StatusCode::UNAUTHORIZED, "token has no subject".to_string()))?;

        Ok(AuthUser(sub))
    }
}

/// Accepts only service-role keys. Used by the grant endpoint, which is
/// called by the payment-confirmation flow and admin tooling, never by users.
#[derive(Debug)]
pub struct ServiceRole;

#[async_trait]
impl FromRequestParts<AppState> for ServiceRole {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let decoded = claims::decode_service(token, &state.config.jwt.secret)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid or expired token".to_string()))?;

        if !decoded.is_service() {
            return Err((StatusCode::FORBIDDEN, "service role required".to_string()));
        }

        Ok(ServiceRole)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, (StatusCode, String)> {
    // Read Authorization header
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "missing Authorization header".to_string(),
        ))?;

    // Expect "Bearer <token>"
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or((StatusCode::UNAUTHORIZED, "invalid auth scheme".to_string()))
}

#[cfg(test)]
mod extractor_tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        let (parts, _body) = builder.body(()).expect("request").into_parts();
        parts
    }

    fn sign(claims: &claims::Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret("test-secret".as_bytes()),
        )
        .expect("sign token")
    }

    fn user_token(user_id: Uuid) -> String {
        sign(&claims::Claims {
            sub: Some(user_id),
            role: "authenticated".into(),
            aud: Some("authenticated".into()),
            exp: (OffsetDateTime::now_utc().unix_timestamp() + 3600) as usize,
        })
    }

    #[tokio::test]
    async fn accepts_valid_user_token() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();
        let token = user_token(user_id);
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));

        let AuthUser(extracted) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(extracted, user_id);
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(None);
        let (status, _) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_non_bearer_scheme() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwdw=="));
        let (status, _) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn service_role_rejects_user_tokens() {
        let state = AppState::fake();
        let token = user_token(Uuid::new_v4());
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        let (status, _) = ServiceRole::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn service_role_accepts_service_key() {
        let state = AppState::fake();
        let token = sign(&claims::Claims {
            sub: None,
            role: claims::SERVICE_ROLE.into(),
            aud: None,
            exp: (OffsetDateTime::now_utc().unix_timestamp() + 3600) as usize,
        });
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        assert!(ServiceRole::from_request_parts(&mut parts, &state)
            .await
            .is_ok());
    }
}
