use thiserror::Error;

/// Failures raised by token service calls.
///
/// Every variant is converted to a user-facing message at the operation
/// boundary and parked in the session's `last_error`; nothing propagates
/// past it.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The request produced no usable response: DNS, connect, timeout, or
    /// an undecodable success body.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-2xx status.
    #[error("server rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Client-side input validation failed; no request was issued.
    #[error("{0}")]
    Validation(String),

    /// Regenerate revoked the old token but could not mint the replacement.
    /// The credential is gone and has to be re-created by hand.
    #[error("regeneration of '{id}' failed after revocation; the token was not re-created")]
    RegenerationLost {
        id: String,
        #[source]
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// User-facing message for a failed revoke. The service's 404 and 429
    /// answers get their own wording; everything else is generic.
    pub fn revoke_message(&self) -> String {
        match self {
            SessionError::Rejected { status: 404, .. } => "token or ID not found".to_string(),
            SessionError::Rejected { status: 429, .. } => {
                "rate limit exceeded, please try again later".to_string()
            }
            _ => "failed to revoke token".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> SessionError {
        SessionError::Rejected { status, body: String::new() }
    }

    #[test]
    fn revoke_classification_special_cases_404_and_429() {
        assert_eq!(rejected(404).revoke_message(), "token or ID not found");
        assert_eq!(
            rejected(429).revoke_message(),
            "rate limit exceeded, please try again later"
        );
    }

    #[test]
    fn revoke_classification_is_generic_for_everything_else() {
        assert_eq!(rejected(500).revoke_message(), "failed to revoke token");
        assert_eq!(rejected(400).revoke_message(), "failed to revoke token");
        assert_eq!(
            SessionError::Network("connection refused".into()).revoke_message(),
            "failed to revoke token"
        );
    }

    #[test]
    fn regeneration_lost_names_the_token() {
        let err = SessionError::RegenerationLost {
            id: "svc-1".into(),
            source: Box::new(rejected(500)),
        };
        let msg = err.to_string();
        assert!(msg.contains("svc-1"));
        assert!(msg.contains("after revocation"));
    }
}
