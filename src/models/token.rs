//! Wire types for the token service management API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provisioned token as reported by `GET /list-tokens`.
///
/// `token` is the hashed+salted display form. The plaintext exists only in
/// the response to the create call that minted it and is never listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: String,
    pub token: String,
    /// Requests-per-window quota enforced by the service. 0 = no limit.
    #[serde(default)]
    pub rate_limit: u64,
    /// Absent on records created before the service tracked it.
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

/// Body for `POST /add-token`.
#[derive(Debug, Clone, Serialize)]
pub struct AddTokenRequest {
    pub id: String,
    /// Omitted on plain creates; the service applies its default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u64>,
}

/// Response to `POST /add-token`: the one-time plaintext.
#[derive(Debug, Deserialize)]
pub struct AddTokenResponse {
    pub token: String,
}

/// Identifies the token to revoke. The service accepts either the record ID
/// or the plaintext value in the same route, keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RevokeSelector {
    Id { id: String },
    Token { token: String },
}

impl RevokeSelector {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::Id { id: id.into() }
    }

    pub fn by_token(token: impl Into<String>) -> Self {
        Self::Token { token: token.into() }
    }

    /// The identifying value, for log lines and prompts.
    pub fn value(&self) -> &str {
        match self {
            Self::Id { id } => id,
            Self::Token { token } => token,
        }
    }
}

/// Response to `POST /revoke-token`.
#[derive(Debug, Deserialize)]
pub struct RevokeResponse {
    #[serde(default)]
    pub message: String,
}

/// Body for `POST /edit-token`.
#[derive(Debug, Clone, Serialize)]
pub struct EditTokenRequest {
    pub id: String,
    pub rate_limit: u64,
}
