//! Authentication domain models.
//!
//! `Identity` is what a token asserts about its bearer; `Claims` is the full
//! verified payload (identity plus the registered JWT fields).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and authorization attributes carried by a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Numeric user id.
    #[serde(rename = "user_id")]
    pub subject_id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

impl Identity {
    pub fn new(subject_id: i64, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            subject_id,
            username: username.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }
}

/// Token kind: short-lived access or long-lived refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Verified JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: Identity,
    pub token_type: TokenKind,
    /// Unique token id; the revocation key.
    pub jti: String,
    pub iss: String,
    /// Username of the bearer.
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn subject_id(&self) -> i64 {
        self.identity.subject_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_serialize_flat() {
        let claims = Claims {
            identity: Identity::new(7, "ana", "ana@clinica.com").with_roles(["terapeuta"]),
            token_type: TokenKind::Access,
            jti: "t-1".into(),
            iss: "clinica-tea-api".into(),
            sub: "ana".into(),
            iat: 1,
            nbf: 1,
            exp: 2,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["roles"][0], "terapeuta");
        assert_eq!(json["token_type"], "access");

        let back: Claims = serde_json::from_value(json).unwrap();
        assert_eq!(back, claims);
    }
}
