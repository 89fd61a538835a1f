//! API server configuration.

use std::time::Duration;

use clinica_core::auth::jwt::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS, TokenConfig};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Maximum pooled PostgreSQL connections.
    pub pg_max_connections: u32,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// How long after expiry a token may still be refreshed.
    pub refresh_grace_secs: i64,
    /// Deadline for every data store call made by a request.
    pub store_timeout: Duration,
    /// Bootstrap admin, created at startup when no admin exists.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                 | Default                                  |
    /// |--------------------------|------------------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:8080`                         |
    /// | `DATABASE_URL`           | `postgres://localhost:5432/clinica`      |
    /// | `DB_MAX_CONNECTIONS`     | `10`                                     |
    /// | `JWT_SECRET`             | required                                 |
    /// | `ACCESS_TOKEN_TTL_SECS`  | `3600`                                   |
    /// | `REFRESH_TOKEN_TTL_SECS` | `604800`                                 |
    /// | `REFRESH_GRACE_SECS`     | refresh token TTL                        |
    /// | `STORE_TIMEOUT_SECS`     | `10`                                     |
    /// | `ADMIN_EMAIL`            | unset                                    |
    /// | `ADMIN_PASSWORD`         | unset                                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let refresh_token_ttl_secs = parse_secs(&var, "REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?;

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".into()),
            pg_connection_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/clinica".into()),
            pg_max_connections: parse(&var, "DB_MAX_CONNECTIONS", 10)?,
            jwt_secret,
            access_token_ttl_secs: parse_secs(&var, "ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?,
            refresh_token_ttl_secs,
            refresh_grace_secs: parse_secs(&var, "REFRESH_GRACE_SECS", refresh_token_ttl_secs)?,
            store_timeout: Duration::from_secs(parse(&var, "STORE_TIMEOUT_SECS", 10)?),
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
        })
    }

    /// Token service settings derived from this configuration.
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.jwt_secret.clone(),
            access_ttl: chrono::Duration::seconds(self.access_token_ttl_secs),
            refresh_ttl: chrono::Duration::seconds(self.refresh_token_ttl_secs),
            refresh_grace: chrono::Duration::seconds(self.refresh_grace_secs),
        }
    }
}

/// Upper bound for token lifetimes and the refresh grace window: 10 years.
pub const MAX_TOKEN_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// A token duration in seconds, within `0..=MAX_TOKEN_SECS`.
fn parse_secs(var: &impl Fn(&str) -> Option<String>, key: &'static str, default: i64) -> Result<i64, ConfigError> {
    let secs = parse(var, key, default)?;
    if secs > MAX_TOKEN_SECS {
        return Err(ConfigError::Invalid {
            var: key,
            value: secs.to_string(),
        });
    }
    Ok(secs)
}

/// Parse a non-negative number, falling back to `default` when unset.
fn parse<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) if v >= T::default() => Ok(v),
            _ => Err(ConfigError::Invalid { var: key, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn secret_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("JWT_SECRET"))));
        assert!(matches!(
            config(&[("JWT_SECRET", "  ")]),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("JWT_SECRET", "s")]).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.access_token_ttl_secs, 3600);
        assert_eq!(cfg.refresh_token_ttl_secs, 604_800);
        assert_eq!(cfg.refresh_grace_secs, 604_800);
        assert_eq!(cfg.store_timeout, Duration::from_secs(10));
        assert!(cfg.admin_email.is_none());
    }

    #[test]
    fn grace_follows_refresh_ttl_unless_set() {
        let cfg = config(&[("JWT_SECRET", "s"), ("REFRESH_TOKEN_TTL_SECS", "100")]).unwrap();
        assert_eq!(cfg.refresh_grace_secs, 100);

        let cfg = config(&[
            ("JWT_SECRET", "s"),
            ("REFRESH_TOKEN_TTL_SECS", "100"),
            ("REFRESH_GRACE_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(cfg.refresh_grace_secs, 5);
        assert_eq!(cfg.token_config().refresh_grace, chrono::Duration::seconds(5));
    }

    #[test]
    fn rejects_out_of_range_token_lifetimes() {
        for key in ["ACCESS_TOKEN_TTL_SECS", "REFRESH_TOKEN_TTL_SECS", "REFRESH_GRACE_SECS"] {
            assert!(
                matches!(
                    config(&[("JWT_SECRET", "s"), (key, "100000000000000000")]),
                    Err(ConfigError::Invalid { var, .. }) if var == key
                ),
                "{key}"
            );
        }

        let max = MAX_TOKEN_SECS.to_string();
        let cfg = config(&[("JWT_SECRET", "s"), ("ACCESS_TOKEN_TTL_SECS", max.as_str())]).unwrap();
        assert_eq!(cfg.token_config().access_ttl, chrono::Duration::seconds(MAX_TOKEN_SECS));
    }

    #[test]
    fn rejects_bad_numbers() {
        for (key, value) in [("ACCESS_TOKEN_TTL_SECS", "soon"), ("STORE_TIMEOUT_SECS", "-1")] {
            assert!(matches!(
                config(&[("JWT_SECRET", "s"), (key, value)]),
                Err(ConfigError::Invalid { .. })
            ));
        }
    }
}
