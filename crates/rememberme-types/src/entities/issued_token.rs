use std::fmt;

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::credential::{Credential, TokenPair};

/// A freshly created token pair, ready to be encoded into the outgoing cookie
#[derive(Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
pub struct IssuedToken {
    #[serde(rename = "userid")]
    pub user_id: String,
    pub series: String,
    pub token: String,
    /// When the pair's expiry index entry comes due
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn pair(&self) -> TokenPair {
        TokenPair::new(self.series.clone(), self.token.clone())
    }

    /// The triple the client will present on its next visit
    pub fn credential(&self) -> Credential {
        Credential {
            user_id: self.user_id.clone(),
            series: self.series.clone(),
            token: self.token.clone(),
        }
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("user_id", &self.user_id)
            .field("series", &self.series)
            .field("token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
