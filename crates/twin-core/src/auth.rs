//! Authentication data for the logged-in operator.

use serde::{Deserialize, Serialize};

/// Role of an authenticated operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The citizen owning the twin.
    Citizen,
    /// Medical personnel with read access.
    Doctor,
    /// Administrative operator.
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Citizen => "citizen",
            Self::Doctor => "doctor",
            Self::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// Session data for one authenticated operator.
///
/// Exactly one instance is live per controller: set once on login and
/// replaced atomically on each token renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationInfo {
    /// Bearer token for channel calls.
    pub token: String,
    /// Identity of the operator the token was issued to.
    pub user: String,
    /// Role granted by the authentication service.
    pub role: Role,
    /// Token expiry (Unix epoch seconds).
    pub expires_at: i64,
}

/// Result of a successful token renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewedToken {
    /// Replacement bearer token.
    pub token: String,
    /// New expiry (Unix epoch seconds).
    pub expires_at: i64,
}
