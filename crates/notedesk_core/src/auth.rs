//! Identity resolution boundary.
//!
//! Token verification lives outside the core; services only ever see the
//! resolved identity string. `StaticTokenResolver` is an in-memory stand-in
//! for local tooling and tests.

use crate::time::Clock;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

pub trait IdentityResolver {
    /// Maps a bearer credential to an identity.
    fn resolve(&self, token: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenGrant {
    identity: String,
    expires_at: Option<DateTime<Utc>>,
}

pub struct StaticTokenResolver {
    grants: HashMap<String, TokenGrant>,
    clock: Arc<dyn Clock>,
}

impl StaticTokenResolver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            grants: HashMap::new(),
            clock,
        }
    }

    /// Registers `token` for `identity`; `expires_at = None` never expires.
    pub fn with_token(
        mut self,
        token: impl Into<String>,
        identity: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.grants.insert(
            token.into(),
            TokenGrant {
                identity: identity.into(),
                expires_at,
            },
        );
        self
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve(&self, token: &str) -> Result<String, AuthError> {
        let token = match token.trim() {
            scheme_only if scheme_only == "Bearer" => "",
            raw => raw.strip_prefix("Bearer ").unwrap_or(raw).trim(),
        };
        if token.is_empty() {
            return Err(AuthError::Missing);
        }
        let grant = self.grants.get(token).ok_or(AuthError::Invalid)?;
        match grant.expires_at {
            Some(expires_at) if expires_at <= self.clock.now() => Err(AuthError::Expired),
            _ => Ok(grant.identity.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use chrono::{Duration, TimeZone};

    fn resolver(clock: Arc<ManualClock>) -> StaticTokenResolver {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        StaticTokenResolver::new(clock)
            .with_token("t-alice", "alice@example.com", None)
            .with_token("t-bob", "bob@example.com", Some(start + Duration::minutes(5)))
    }

    #[test]
    fn resolves_known_tokens_with_or_without_scheme() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let resolver = resolver(clock);
        assert_eq!(resolver.resolve("t-alice").unwrap(), "alice@example.com");
        assert_eq!(
            resolver.resolve("Bearer t-bob").unwrap(),
            "bob@example.com"
        );
    }

    #[test]
    fn distinguishes_missing_invalid_and_expired() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let resolver = resolver(clock.clone());
        assert_eq!(resolver.resolve("  "), Err(AuthError::Missing));
        assert_eq!(resolver.resolve("Bearer "), Err(AuthError::Missing));
        assert_eq!(resolver.resolve("nope"), Err(AuthError::Invalid));

        clock.advance(Duration::minutes(5));
        assert_eq!(resolver.resolve("t-bob"), Err(AuthError::Expired));
    }
}
