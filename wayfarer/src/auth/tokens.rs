use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::{AppError, UnauthorizedKind};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub kind: TokenKind,
    /// Expiry, epoch seconds.
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies `base64(claims).base64(hmac)` tokens; access and refresh use separate secrets.
#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(access_secret: &str, refresh_secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access_secret: access_secret.as_bytes().to_vec(),
            refresh_secret: refresh_secret.as_bytes().to_vec(),
            access_ttl,
            refresh_ttl,
        }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn mac(&self, kind: TokenKind) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(self.secret(kind)).map_err(|e| AppError::Unexpected(format!("hmac key: {e}")))
    }

    pub fn issue(&self, user_id: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<String, AppError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id.to_string(),
            kind,
            exp: (now + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).map_err(|e| AppError::Unexpected(e.to_string()))?);
        let mut mac = self.mac(kind)?;
        mac.update(body.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{body}.{signature}"))
    }

    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue(user_id, TokenKind::Access, now)?,
            refresh_token: self.issue(user_id, TokenKind::Refresh, now)?,
        })
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        self.verify_at(token, kind, Utc::now())
    }

    /// Signature and kind are checked before expiry, so a forged token never reads as expired.
    pub fn verify_at(&self, token: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<Claims, AppError> {
        let invalid = || AppError::Unauthorized(UnauthorizedKind::Invalid);
        let (body, signature) = token.split_once('.').ok_or_else(invalid)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;

        let mut mac = self.mac(kind)?;
        mac.update(body.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let raw = URL_SAFE_NO_PAD.decode(body).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&raw).map_err(|_| invalid())?;
        if claims.kind != kind {
            return Err(invalid());
        }
        if claims.exp <= now.timestamp() {
            return Err(AppError::Unauthorized(UnauthorizedKind::Expired));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("access", "refresh", Duration::hours(1), Duration::days(7))
    }

    fn kind_of(err: AppError) -> UnauthorizedKind {
        match err {
            AppError::Unauthorized(kind) => kind,
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let pair = issuer().issue_pair("u1").unwrap();
        let claims = issuer().verify(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(issuer().verify(&pair.refresh_token, TokenKind::Refresh).unwrap().sub, "u1");
    }

    #[test]
    fn expired_is_distinguished_from_invalid() {
        let issuer = issuer();
        let now = Utc::now();
        let token = issuer.issue("u1", TokenKind::Access, now).unwrap();
        let later = now + Duration::hours(2);
        assert_eq!(
            kind_of(issuer.verify_at(&token, TokenKind::Access, later).unwrap_err()),
            UnauthorizedKind::Expired
        );
        assert_eq!(
            kind_of(issuer.verify_at("garbage", TokenKind::Access, now).unwrap_err()),
            UnauthorizedKind::Invalid
        );
    }

    #[test]
    fn kinds_and_secrets_do_not_mix() {
        let issuer = issuer();
        let pair = issuer.issue_pair("u1").unwrap();
        assert_eq!(
            kind_of(issuer.verify(&pair.access_token, TokenKind::Refresh).unwrap_err()),
            UnauthorizedKind::Invalid
        );

        let other = TokenIssuer::new("other", "refresh", Duration::hours(1), Duration::days(7));
        assert_eq!(
            kind_of(other.verify(&pair.access_token, TokenKind::Access).unwrap_err()),
            UnauthorizedKind::Invalid
        );
    }

    #[test]
    fn tampered_claims_fail_signature() {
        let issuer = issuer();
        let token = issuer.issue("u1", TokenKind::Access, Utc::now()).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged_claims = Claims {
            sub: "admin".into(),
            kind: TokenKind::Access,
            exp: i64::MAX,
            jti: "x".into(),
        };
        let forged_body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_body}.{signature}");
        assert!(issuer.verify(&forged, TokenKind::Access).is_err());
    }

    #[test]
    fn pairs_are_unique() {
        let issuer = issuer();
        assert_ne!(issuer.issue_pair("u1").unwrap(), issuer.issue_pair("u1").unwrap());
    }
}
