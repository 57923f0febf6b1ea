use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{EmailClaims, Envelope, SessionClaims, TokenKind, CLAIMS_VERSION};
use crate::{
    config::JwtConfig,
    error::{AuthError, Result},
};

/// Stateless token issuer/verifier holding the signing secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    pub session_ttl: Duration,
    pub activation_ttl: Duration,
    pub reset_ttl: Duration,
}

fn minutes(m: i64) -> Duration {
    Duration::from_secs((m.max(0) as u64).saturating_mul(60))
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            session_ttl: minutes(cfg.ttl_minutes),
            activation_ttl: minutes(cfg.activation_ttl_minutes),
            reset_ttl: minutes(cfg.reset_ttl_minutes),
        }
    }
}

impl JwtKeys {
    /// Sign `claims` with an absolute expiry of `now + ttl`.
    pub fn issue<C: Serialize>(&self, kind: TokenKind, claims: &C, ttl: Duration) -> Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = TimeDuration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| AuthError::Internal(anyhow::anyhow!("token ttl {ttl:?} out of range")))?;
        let envelope = Envelope {
            v: CLAIMS_VERSION,
            kind,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            claims,
        };
        let token = encode(&Header::new(Algorithm::HS256), &envelope, &self.encoding)
            .map_err(|e| AuthError::Internal(anyhow::Error::new(e).context("jwt encode")))?;
        debug!(kind = ?kind, "jwt signed");
        Ok(token)
    }

    /// Check signature, shape, kind and expiry, then return the claims as issued.
    pub fn verify<C: DeserializeOwned>(&self, kind: TokenKind, token: &str) -> Result<C> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Expiry is checked below with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Envelope<C>>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AuthError::InvalidToken
        })?;
        let envelope = data.claims;

        if envelope.v != CLAIMS_VERSION || envelope.kind != kind {
            debug!(version = envelope.v, kind = ?envelope.kind, expected = ?kind, "jwt of wrong version or kind");
            return Err(AuthError::InvalidToken);
        }
        if OffsetDateTime::now_utc().unix_timestamp() >= envelope.exp {
            return Err(AuthError::Expired);
        }
        debug!(kind = ?kind, "jwt verified");
        Ok(envelope.claims)
    }

    pub fn issue_session(&self, claims: &SessionClaims) -> Result<String> {
        self.issue(TokenKind::Session, claims, self.session_ttl)
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionClaims> {
        self.verify(TokenKind::Session, token)
    }

    pub fn issue_activation(&self, email: &str) -> Result<String> {
        let claims = EmailClaims { email: email.to_string() };
        self.issue(TokenKind::Activation, &claims, self.activation_ttl)
    }

    pub fn verify_activation(&self, token: &str) -> Result<EmailClaims> {
        self.verify(TokenKind::Activation, token)
    }

    pub fn issue_reset(&self, email: &str) -> Result<String> {
        let claims = EmailClaims { email: email.to_string() };
        self.issue(TokenKind::PasswordReset, &claims, self.reset_ttl)
    }

    pub fn verify_reset(&self, token: &str) -> Result<EmailClaims> {
        self.verify(TokenKind::PasswordReset, token)
    }
}
