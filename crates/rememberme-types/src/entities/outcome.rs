use serde::{Deserialize, Serialize};

use super::issued_token::IssuedToken;

/// Result of validating a presented credential
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ValidationOutcome {
    /// The pair was active and has now been consumed
    Valid,
    /// Unknown, expired or inconsistent credential
    Invalid,
    /// The series is still active but the token was already consumed: a
    /// stale credential is being replayed
    Breach,
}

impl ValidationOutcome {
    pub fn is_valid(self) -> bool {
        self == ValidationOutcome::Valid
    }

    pub fn is_breach(self) -> bool {
        self == ValidationOutcome::Breach
    }
}

/// Outcome of a complete remember-me login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    /// The credential was valid; the successor pair continues the same series
    Authenticated(IssuedToken),
    /// The credential was not accepted; nothing else changed
    Rejected,
    /// A stale credential was replayed; every chain of the user was revoked
    Breach { user_id: String },
}

impl Authentication {
    pub fn outcome(&self) -> ValidationOutcome {
        match self {
            Authentication::Authenticated(_) => ValidationOutcome::Valid,
            Authentication::Rejected => ValidationOutcome::Invalid,
            Authentication::Breach { .. } => ValidationOutcome::Breach,
        }
    }
}
