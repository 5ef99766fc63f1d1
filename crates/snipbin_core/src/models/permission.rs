//! Capability vocabulary carried by share tokens.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One capability on a single document.
///
/// Variant order is the canonical vocabulary order used when tokens are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Delete,
    Share,
}

impl Permission {
    /// Every permission, in vocabulary order.
    pub const ALL: [Permission; 4] = [
        Permission::Read,
        Permission::Write,
        Permission::Delete,
        Permission::Share,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
            Permission::Share => "share",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("Unknown permission '{}'", value)))
    }
}

/// Sort permissions into vocabulary order and drop duplicates.
pub fn canonicalize_permissions(permissions: &[Permission]) -> Vec<Permission> {
    let mut canonical = permissions.to_vec();
    canonical.sort_unstable();
    canonical.dedup();
    canonical
}

/// Parse permission strings against the closed vocabulary.
///
/// # Returns
/// Canonical permission list.
///
/// # Errors
/// Returns [`AppError::Validation`] naming the first unknown string.
pub fn parse_permissions<S: AsRef<str>>(values: &[S]) -> Result<Vec<Permission>, AppError> {
    let parsed = values
        .iter()
        .map(|value| value.as_ref().parse())
        .collect::<Result<Vec<Permission>, AppError>>()?;
    Ok(canonicalize_permissions(&parsed))
}

/// Request payload for minting a share token.
#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub permissions: Vec<String>,
}

/// Response payload carrying a freshly signed token.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub token: String,
}
