//! JWT token issuance, verification, refresh and revocation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use uuid::Uuid;

use super::TokenError;
use super::revocation::RevocationStore;
use crate::models::auth::{Claims, Identity, TokenKind};

/// `iss` claim of every token this service issues and accepts.
pub const ISSUER: &str = "clinica-tea-api";

/// Access token lifetime: 1 hour.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 60 * 60;

/// Refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Token service settings. The secret always comes from configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// How long after expiry a token may still be refreshed.
    pub refresh_grace: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            refresh_grace: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
        }
    }
}

/// Issues and verifies HS256 tokens against a pluggable revocation store.
pub struct TokenService {
    config: TokenConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    strict: Validation,
    lenient: Validation,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenService {
    pub fn new(config: TokenConfig, revocations: Arc<dyn RevocationStore>) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            return Err(TokenError::Signing("signing secret is empty".into()));
        }
        let secret = config.secret.as_bytes();

        let mut strict = Validation::new(ALGORITHM);
        strict.leeway = 0;
        strict.validate_nbf = true;
        strict.set_issuer(&[ISSUER]);
        strict.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

        let mut lenient = strict.clone();
        lenient.validate_exp = false;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            config,
            strict,
            lenient,
            revocations,
        })
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Sign a token for `identity` valid for `ttl` from now.
    pub fn issue(&self, identity: &Identity, kind: TokenKind, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(identity, kind, ttl, Utc::now())
    }

    /// Sign a token as if issued at `now`.
    pub fn issue_at(
        &self,
        identity: &Identity,
        kind: TokenKind,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            identity: identity.clone(),
            token_type: kind,
            jti: Uuid::new_v4().to_string(),
            iss: ISSUER.to_string(),
            sub: identity.username.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: now
                .checked_add_signed(ttl)
                .ok_or_else(|| TokenError::Signing("token lifetime out of range".into()))?
                .timestamp(),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(format!("jwt encode: {e}")))
    }

    pub fn issue_access(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue(identity, TokenKind::Access, self.config.access_ttl)
    }

    pub fn issue_refresh(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue(identity, TokenKind::Refresh, self.config.refresh_ttl)
    }

    /// Check signature, algorithm, issuer, not-before and expiry.
    ///
    /// Does not consult the revocation store; see [`Self::authenticate`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.strict)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// [`Self::verify`] plus the revocation check. Only access tokens are
    /// bearer credentials; a refresh token here is `Invalid`.
    pub async fn authenticate(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        ensure_kind(&claims, TokenKind::Access)?;
        self.ensure_not_revoked(&claims).await?;
        Ok(claims)
    }

    /// Claims of a token eligible for refresh: an authentic refresh token,
    /// not revoked, and either unexpired or expired within the grace window.
    pub async fn refresh_claims(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.decode_lenient(token)?;
        ensure_kind(&claims, TokenKind::Refresh)?;
        if Utc::now() > claims.expires_at() + self.config.refresh_grace {
            return Err(TokenError::Expired);
        }
        self.ensure_not_revoked(&claims).await?;
        Ok(claims)
    }

    /// Re-issue an access token with the same identity and a fresh window.
    pub async fn refresh(&self, token: &str) -> Result<String, TokenError> {
        let claims = self.refresh_claims(token).await?;
        self.issue_access(&claims.identity)
    }

    /// Add the token to the denylist for as long as it could be refreshed.
    ///
    /// Expired tokens are accepted; forged ones are `Invalid`.
    pub async fn revoke(&self, token: &str) -> Result<(), TokenError> {
        let claims = self.decode_lenient(token)?;
        self.revoke_claims(&claims).await
    }

    /// Revoke an already verified token.
    pub async fn revoke_claims(&self, claims: &Claims) -> Result<(), TokenError> {
        let retain_until = claims.expires_at() + self.config.refresh_grace;
        self.revocations.revoke(&claims.jti, retain_until).await?;
        debug!(jti = %claims.jti, user_id = claims.subject_id(), "token revoked");
        Ok(())
    }

    /// Spend a refresh token: revoke it, failing with `Revoked` when it was
    /// already spent. Of two concurrent spends only one succeeds.
    pub async fn consume(&self, claims: &Claims) -> Result<(), TokenError> {
        let retain_until = claims.expires_at() + self.config.refresh_grace;
        if !self.revocations.revoke_if_absent(&claims.jti, retain_until).await? {
            return Err(TokenError::Revoked);
        }
        debug!(jti = %claims.jti, user_id = claims.subject_id(), "refresh token spent");
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, TokenError> {
        let claims = self.decode_lenient(token)?;
        self.revocations.is_revoked(&claims.jti).await
    }

    fn decode_lenient(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.lenient)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }

    async fn ensure_not_revoked(&self, claims: &Claims) -> Result<(), TokenError> {
        if self.revocations.is_revoked(&claims.jti).await? {
            return Err(TokenError::Revoked);
        }
        Ok(())
    }
}

fn ensure_kind(claims: &Claims, expected: TokenKind) -> Result<(), TokenError> {
    if claims.token_type != expected {
        debug!(jti = %claims.jti, got = ?claims.token_type, want = ?expected, "wrong token kind");
        return Err(TokenError::Invalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::{MemoryRevocationStore, NoopRevocationStore};

    const SECRET: &str = "test-secret-for-clinica";

    fn service() -> TokenService {
        TokenService::new(TokenConfig::new(SECRET), Arc::new(MemoryRevocationStore::new())).unwrap()
    }

    fn identity() -> Identity {
        Identity::new(42, "marina", "marina@clinica.com")
            .with_roles(["terapeuta"])
            .with_permissions(["pacientes:*"])
            .with_scopes(["api:read"])
    }

    fn expired_token(svc: &TokenService) -> String {
        expired(svc, TokenKind::Access)
    }

    fn expired_refresh_token(svc: &TokenService) -> String {
        expired(svc, TokenKind::Refresh)
    }

    fn expired(svc: &TokenService, kind: TokenKind) -> String {
        svc.issue_at(&identity(), kind, Duration::hours(1), Utc::now() - Duration::hours(2))
            .unwrap()
    }

    #[test]
    fn verify_after_issue_returns_claims() {
        let svc = service();
        let token = svc.issue_access(&identity()).unwrap();
        let claims = svc.verify(&token).unwrap();

        assert_eq!(claims.identity, identity());
        assert_eq!(claims.token_type, TokenKind::Access);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.sub, "marina");
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp - claims.iat, DEFAULT_ACCESS_TTL_SECS);
    }

    #[test]
    fn every_token_gets_a_distinct_id() {
        let svc = service();
        let a = svc.verify(&svc.issue_access(&identity()).unwrap()).unwrap();
        let b = svc.verify(&svc.issue_access(&identity()).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn refresh_tokens_use_refresh_ttl() {
        let svc = service();
        let claims = svc.verify(&svc.issue_refresh(&identity()).unwrap()).unwrap();
        assert_eq!(claims.token_type, TokenKind::Refresh);
        assert_eq!(claims.exp - claims.iat, DEFAULT_REFRESH_TTL_SECS);
    }

    #[test]
    fn expired_token_is_expired_not_invalid() {
        let svc = service();
        assert_eq!(svc.verify(&expired_token(&svc)), Err(TokenError::Expired));
    }

    #[test]
    fn other_secret_is_invalid() {
        let other = TokenService::new(TokenConfig::new("another-secret"), Arc::new(NoopRevocationStore)).unwrap();
        let token = other.issue_access(&identity()).unwrap();
        assert_eq!(service().verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn expired_token_with_other_secret_is_invalid() {
        let other = TokenService::new(TokenConfig::new("another-secret"), Arc::new(NoopRevocationStore)).unwrap();
        assert_eq!(service().verify(&expired_token(&other)), Err(TokenError::Invalid));
    }

    #[test]
    fn algorithm_mismatch_is_invalid() {
        let svc = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            identity: identity(),
            token_type: TokenKind::Access,
            jti: "x".into(),
            iss: ISSUER.into(),
            sub: "marina".into(),
            iat: now,
            nbf: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(svc.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn wrong_issuer_is_invalid() {
        let svc = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            identity: identity(),
            token_type: TokenKind::Access,
            jti: "x".into(),
            iss: "someone-else".into(),
            sub: "marina".into(),
            iat: now,
            nbf: now,
            exp: now + 3600,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert_eq!(svc.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn not_yet_valid_is_invalid() {
        let svc = service();
        let token = svc
            .issue_at(&identity(), TokenKind::Access, Duration::hours(1), Utc::now() + Duration::minutes(10))
            .unwrap();
        assert_eq!(svc.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn garbage_is_invalid() {
        let svc = service();
        assert_eq!(svc.verify(""), Err(TokenError::Invalid));
        assert_eq!(svc.verify("not.a.jwt"), Err(TokenError::Invalid));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(TokenService::new(TokenConfig::new(""), Arc::new(NoopRevocationStore)).is_err());
    }

    #[tokio::test]
    async fn refresh_of_expired_token_extends_expiry() {
        let svc = service();
        let old = expired_refresh_token(&svc);
        let old_exp = svc.refresh_claims(&old).await.unwrap().exp;

        let fresh = svc.refresh(&old).await.unwrap();
        let claims = svc.verify(&fresh).unwrap();
        assert!(claims.exp > old_exp);
        assert_eq!(claims.identity, identity());
        assert_eq!(claims.token_type, TokenKind::Access);
    }

    #[tokio::test]
    async fn refresh_of_invalid_token_fails() {
        let svc = service();
        let mut token = svc.issue_refresh(&identity()).unwrap();
        token.push('x');
        assert_eq!(svc.refresh(&token).await, Err(TokenError::Invalid));
    }

    #[tokio::test]
    async fn refresh_outside_grace_window_is_expired() {
        let mut config = TokenConfig::new(SECRET);
        config.refresh_grace = Duration::minutes(30);
        let svc = TokenService::new(config, Arc::new(NoopRevocationStore)).unwrap();
        assert_eq!(svc.refresh(&expired_refresh_token(&svc)).await, Err(TokenError::Expired));
    }

    #[tokio::test]
    async fn revoked_tokens_fail_authenticate_and_refresh() {
        let svc = service();
        let token = svc.issue_access(&identity()).unwrap();
        assert!(!svc.is_revoked(&token).await.unwrap());
        assert!(svc.authenticate(&token).await.is_ok());

        svc.revoke(&token).await.unwrap();

        assert!(svc.is_revoked(&token).await.unwrap());
        assert_eq!(svc.authenticate(&token).await, Err(TokenError::Revoked));
        // Signature checks alone still pass.
        assert!(svc.verify(&token).is_ok());

        let refresh = svc.issue_refresh(&identity()).unwrap();
        svc.revoke(&refresh).await.unwrap();
        assert_eq!(svc.refresh(&refresh).await, Err(TokenError::Revoked));
    }

    #[tokio::test]
    async fn expired_tokens_can_be_revoked() {
        let svc = service();
        let token = expired_refresh_token(&svc);
        svc.revoke(&token).await.unwrap();
        assert_eq!(svc.refresh(&token).await, Err(TokenError::Revoked));
    }

    #[tokio::test]
    async fn noop_store_never_revokes() {
        let svc = TokenService::new(TokenConfig::new(SECRET), Arc::new(NoopRevocationStore)).unwrap();
        let token = svc.issue_access(&identity()).unwrap();
        svc.revoke(&token).await.unwrap();
        assert!(!svc.is_revoked(&token).await.unwrap());
        assert!(svc.authenticate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_tokens_are_not_bearer_credentials() {
        let svc = service();
        let refresh = svc.issue_refresh(&identity()).unwrap();
        assert!(svc.verify(&refresh).is_ok());
        assert_eq!(svc.authenticate(&refresh).await, Err(TokenError::Invalid));
    }

    #[tokio::test]
    async fn access_tokens_cannot_be_refreshed() {
        let svc = service();
        let access = svc.issue_access(&identity()).unwrap();
        assert_eq!(svc.refresh_claims(&access).await, Err(TokenError::Invalid));
        assert_eq!(svc.refresh(&expired_token(&svc)).await, Err(TokenError::Invalid));
    }

    #[tokio::test]
    async fn refresh_tokens_are_spent_once() {
        let svc = service();
        let refresh = svc.issue_refresh(&identity()).unwrap();
        let claims = svc.refresh_claims(&refresh).await.unwrap();

        svc.consume(&claims).await.unwrap();
        assert_eq!(svc.consume(&claims).await, Err(TokenError::Revoked));
        assert_eq!(svc.refresh_claims(&refresh).await, Err(TokenError::Revoked));
    }

    #[test]
    fn out_of_range_lifetime_is_an_error() {
        let svc = service();
        let result = svc.issue(&identity(), TokenKind::Access, Duration::days(365 * 1_000_000));
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }
}
