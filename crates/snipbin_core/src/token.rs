//! Stateless share tokens scoped to one document.

use crate::error::AppError;
use crate::models::permission::{canonicalize_permissions, parse_permissions, Permission};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShareTokenClaims {
    sub: String,
    permissions: Vec<String>,
}

/// Verified contents of a share token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareClaims {
    pub document_id: String,
    pub permissions: Vec<Permission>,
}

impl ShareClaims {
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_for(&self, document_id: &str) -> bool {
        self.document_id == document_id
    }
}

/// Signs and verifies share tokens with one process-wide secret.
///
/// Tokens carry no expiry; they stay valid until the secret changes.
#[derive(Clone)]
pub struct PermissionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl PermissionTokenService {
    /// # Errors
    /// Returns [`AppError::Validation`] when `secret` is empty.
    pub fn new(secret: &str) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Validation(
                "Token signing secret must not be empty".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Sign a token for `document_id` from raw permission strings.
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] for a string outside the permission
    /// vocabulary, or [`AppError::Token`] if signing fails.
    pub fn issue_token<S: AsRef<str>>(
        &self,
        document_id: &str,
        permissions: &[S],
    ) -> Result<String, AppError> {
        let permissions = parse_permissions(permissions)?;
        self.issue(document_id, &permissions)
    }

    /// Sign a token for `document_id` granting `permissions`.
    ///
    /// # Errors
    /// Returns [`AppError::Token`] if signing fails.
    pub fn issue(&self, document_id: &str, permissions: &[Permission]) -> Result<String, AppError> {
        let claims = ShareTokenClaims {
            sub: document_id.to_string(),
            permissions: canonicalize_permissions(permissions)
                .into_iter()
                .map(|permission| permission.as_str().to_string())
                .collect(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    /// Returns [`AppError::Unauthorized`] for a bad signature, malformed
    /// claims, or a permission outside the vocabulary.
    pub fn validate_token(&self, token: &str) -> Result<ShareClaims, AppError> {
        let claims = decode::<ShareTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| AppError::Unauthorized(format!("Invalid share token: {}", err)))?
            .claims;

        let permissions = parse_permissions(&claims.permissions)
            .map_err(|err| AppError::Unauthorized(format!("Invalid share token: {}", err)))?;

        Ok(ShareClaims {
            document_id: claims.sub,
            permissions,
        })
    }
}
