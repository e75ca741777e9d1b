//! Caller authentication and scope gating.
//!
//! The host runtime validates tokens before they reach us; here we only read
//! the claims to decide which scopes the caller was granted.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;

use crate::config::ScopeSet;
use crate::errors::{AppError, AppResult};

/// Prefix of the composite header the host sends for control plane calls.
pub const SUBJECT_AND_APP_TOKEN_PREFIX: &str = "SubjectAndAppToken";

/// Claims we read from the caller token.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Space separated delegated scopes.
    #[serde(default)]
    pub scp: Option<String>,
    /// Application roles.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub upn: Option<String>,
}

impl TokenClaims {
    /// Decodes the payload segment of a JWT without verifying it.
    pub fn decode(token: &str) -> AppResult<Self> {
        let payload = token.split('.').nth(1).ok_or(AppError::Unauthorized)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| AppError::Unauthorized)?;
        serde_json::from_slice(&bytes).map_err(|_| AppError::Unauthorized)
    }

    /// All granted scopes and roles.
    pub fn granted(&self) -> Vec<&str> {
        self.scp
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .chain(self.roles.iter().map(String::as_str))
            .collect()
    }
}

/// Authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    /// Header value as received, forwarded verbatim for subject-and-app calls.
    pub raw_header: String,
    /// The user token (bearer token or the subject token of a composite header).
    pub user_token: String,
    pub claims: TokenClaims,
}

impl AuthorizationContext {
    /// Parses the `Authorization` header of a request.
    pub fn from_headers(headers: &HeaderMap) -> AppResult<Self> {
        let raw_header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let user_token = if raw_header.starts_with(SUBJECT_AND_APP_TOKEN_PREFIX) {
            subject_token(raw_header).ok_or(AppError::Unauthorized)?
        } else {
            extract_bearer_token(raw_header).ok_or(AppError::Unauthorized)?
        };

        let claims = TokenClaims::decode(user_token)?;
        Ok(Self {
            raw_header: raw_header.to_string(),
            user_token: user_token.to_string(),
            claims,
        })
    }

    /// Token to present downstream when no exchange is configured.
    pub fn downstream_token(&self) -> &str {
        if self.raw_header.starts_with(SUBJECT_AND_APP_TOKEN_PREFIX) {
            &self.raw_header
        } else {
            &self.user_token
        }
    }

    /// Fails with `AccessDenied` unless the caller holds one of `allowed`.
    pub fn require_any(&self, allowed: &ScopeSet) -> AppResult<()> {
        if allowed.is_empty() {
            return Ok(());
        }
        if self.claims.granted().iter().any(|s| allowed.contains(s)) {
            Ok(())
        } else {
            tracing::warn!(required = %allowed, "caller lacks required scopes");
            Err(AppError::AccessDenied(allowed.to_string()))
        }
    }
}

impl<S> FromRequestParts<S> for AuthorizationContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

/// Extracts the token from a `Bearer ...` header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Reads `subjectToken="..."` out of a composite header.
fn subject_token(header: &str) -> Option<&str> {
    header
        .split_once(' ')?
        .1
        .split(',')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| *key == "subjectToken")
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn token_with_scopes(scp: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"scp":"{scp}","oid":"user-1"}}"#));
        format!("{header}.{payload}.sig")
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_scopes_are_read() {
        let token = token_with_scopes("Item1.Read.All Eventhouse.ReadWrite.All");
        let ctx = AuthorizationContext::from_headers(&headers(&format!("Bearer {token}"))).unwrap();
        assert_eq!(ctx.claims.oid.as_deref(), Some("user-1"));
        assert!(ctx
            .require_any(&ScopeSet::new(["Eventhouse.ReadWrite.All"]))
            .is_ok());
        assert!(matches!(
            ctx.require_any(&ScopeSet::new(["Item1.ReadWrite.All"])),
            Err(AppError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        assert!(matches!(
            AuthorizationContext::from_headers(&HeaderMap::new()),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            AuthorizationContext::from_headers(&headers("Bearer not-a-jwt")),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_subject_and_app_token_is_forwarded_verbatim() {
        let subject = token_with_scopes("Item1.ReadWrite.All");
        let raw = format!(r#"SubjectAndAppToken1.0 subjectToken="{subject}", appToken="app""#);
        let ctx = AuthorizationContext::from_headers(&headers(&raw)).unwrap();
        assert_eq!(ctx.user_token, subject);
        assert_eq!(ctx.downstream_token(), raw);
    }

    #[test]
    fn test_extract_bearer_token_is_case_insensitive() {
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
