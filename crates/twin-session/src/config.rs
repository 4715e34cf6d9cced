//! Session configuration.

use std::time::Duration;

use twin_core::Role;

/// Configuration for a [`SessionController`](crate::SessionController).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Address channels are constructed against.
    pub remote_addr: String,
    /// Roles accepted at login; everything else is rejected as unsupported
    /// even when the authentication service accepted the credentials.
    pub allowed_roles: Vec<Role>,
    /// How long before token expiry the refresh loop wakes up.
    pub refresh_lead: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remote_addr: "http://localhost:8080".to_string(),
            allowed_roles: vec![Role::Citizen],
            refresh_lead: Duration::from_secs(60),
        }
    }
}
