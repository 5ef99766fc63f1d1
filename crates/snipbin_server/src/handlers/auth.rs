//! Credential extraction for share tokens and webhook secrets.

use crate::{error::HttpError, AppState};
use axum::http::{header, HeaderMap};
use serde::Deserialize;
use snipbin_core::models::permission::Permission;
use snipbin_core::token::ShareClaims;

/// `?token=` query parameter accepted in place of a bearer header.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

fn authorization_with_scheme<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (found, rest) = value.trim().split_once(' ')?;
    if found.eq_ignore_ascii_case(scheme) {
        let rest = rest.trim();
        (!rest.is_empty()).then_some(rest)
    } else {
        None
    }
}

fn presented_token<'a>(headers: &'a HeaderMap, query: &'a TokenQuery) -> Option<&'a str> {
    authorization_with_scheme(headers, "Bearer").or_else(|| {
        query
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

/// Validate the caller's share token for `document_id` and `permission`.
///
/// # Returns
/// The verified claims, for handlers that need the full permission set.
///
/// # Errors
/// 401 when no token or an invalid token is presented, 403 when the token is
/// for another document or lacks `permission`.
pub(crate) fn require_permission(
    state: &AppState,
    headers: &HeaderMap,
    query: &TokenQuery,
    document_id: &str,
    permission: Permission,
) -> Result<ShareClaims, HttpError> {
    let Some(token) = presented_token(headers, query) else {
        return Err(HttpError::unauthorized("A share token is required"));
    };
    let claims = state.tokens.validate_token(token)?;
    if !claims.is_for(document_id) {
        return Err(HttpError::forbidden("Token does not grant access to this document"));
    }
    if !claims.allows(permission) {
        return Err(HttpError::forbidden(format!(
            "Token does not grant '{}' permission",
            permission
        )));
    }
    Ok(claims)
}

/// Like [`require_permission`], but anonymous callers pass through.
///
/// A token that is presented must still be valid for `document_id` and
/// grant `permission`.
pub(crate) fn optional_permission(
    state: &AppState,
    headers: &HeaderMap,
    query: &TokenQuery,
    document_id: &str,
    permission: Permission,
) -> Result<Option<ShareClaims>, HttpError> {
    if presented_token(headers, query).is_none() {
        return Ok(None);
    }
    require_permission(state, headers, query, document_id, permission).map(Some)
}

/// Webhook secret from `Authorization: Secret <secret>`.
///
/// # Errors
/// 401 when the header is missing or uses another scheme.
pub(crate) fn webhook_secret(headers: &HeaderMap) -> Result<String, HttpError> {
    authorization_with_scheme(headers, "Secret")
        .map(str::to_string)
        .ok_or_else(|| HttpError::unauthorized("Webhook secret is required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_header_wins_over_query() {
        let headers = headers_with("Bearer from-header");
        let query = TokenQuery {
            token: Some("from-query".to_string()),
        };
        assert_eq!(presented_token(&headers, &query), Some("from-header"));
        assert_eq!(
            presented_token(&HeaderMap::new(), &query),
            Some("from-query")
        );
        assert_eq!(
            presented_token(&HeaderMap::new(), &TokenQuery { token: Some("  ".into()) }),
            None
        );
    }

    #[test]
    fn secret_scheme_is_case_insensitive_and_required() {
        assert_eq!(
            webhook_secret(&headers_with("secret hunter2")).expect("secret"),
            "hunter2"
        );
        assert!(webhook_secret(&headers_with("Bearer hunter2")).is_err());
        assert!(webhook_secret(&headers_with("Secret ")).is_err());
        assert!(webhook_secret(&HeaderMap::new()).is_err());
    }
}
