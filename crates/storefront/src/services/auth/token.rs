//! Signed identity tokens.
//!
//! Tokens use the compact JWT layout with an HS256 signature:
//! `base64url(header).base64url(claims).base64url(hmac_sha256)`. Claims carry
//! the username (`sub`), the role at issuance, and `iat`/`exp` in Unix
//! seconds. Verification never consults the user table.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use emporium_core::{Role, Username};

use super::AuthError;
use crate::models::Identity;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Username,
    role: Role,
    iat: i64,
    exp: i64,
}

/// Issues and verifies identity tokens with a shared secret.
pub struct TokenIssuer {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenIssuer {
    /// Create an issuer signing with `secret`; tokens expire after `ttl`.
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `identity`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the token cannot be encoded.
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_at(identity, unix_now())
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the token cannot be encoded.
    pub fn issue_at(&self, identity: &Identity, now: i64) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: identity.username.clone(),
            role: identity.role,
            iat: now,
            exp: now.saturating_add(ttl),
        };
        let header = Header {
            alg: ALGORITHM.to_owned(),
            typ: "JWT".to_owned(),
        };

        let header = serde_json::to_vec(&header).map_err(|_| AuthError::Signing)?;
        let claims = serde_json::to_vec(&claims).map_err(|_| AuthError::Signing)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token and return the identity it carries.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for malformed or tampered tokens and
    /// `AuthError::ExpiredToken` once `exp` has passed.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as if the current time were `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::verify`].
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Identity, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidToken);
        };

        // Signature first: nothing inside an unauthenticated token is trusted.
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;
        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(claims.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let header: Header = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::InvalidToken);
        }

        let claims: Claims = decode_segment(claims)?;
        if now >= claims.exp {
            return Err(AuthError::ExpiredToken);
        }

        Ok(Identity {
            username: claims.sub,
            role: claims.role,
        })
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::Signing)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::InvalidToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken)
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_750_000_000;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            SecretString::from("kR9#vQ2$wL7!pX4@mN8&zT1*bY6^cH3%"),
            Duration::from_secs(900),
        )
    }

    fn identity(role: Role) -> Identity {
        Identity {
            username: Username::parse("user1").unwrap(),
            role,
        }
    }

    #[test]
    fn test_round_trip_carries_username_and_role() {
        let issuer = issuer();
        let token = issuer.issue_at(&identity(Role::Admin), NOW).unwrap();

        let verified = issuer.verify_at(&token, NOW + 10).unwrap();
        assert_eq!(verified, identity(Role::Admin));
    }

    #[test]
    fn test_expired_token() {
        let issuer = issuer();
        let token = issuer.issue_at(&identity(Role::Customer), NOW).unwrap();

        assert!(issuer.verify_at(&token, NOW + 899).is_ok());
        assert!(matches!(
            issuer.verify_at(&token, NOW + 900),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_tampered_claims_are_rejected() {
        let issuer = issuer();
        let token = issuer.issue_at(&identity(Role::Customer), NOW).unwrap();

        // Swap in claims that promote the caller to admin.
        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                sub: Username::parse("user1").unwrap(),
                role: Role::Admin,
                iat: NOW,
                exp: NOW + 900,
            })
            .unwrap(),
        );
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{forged_claims}.{}", parts[0], parts[2]);

        assert!(matches!(
            issuer.verify_at(&forged, NOW),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = issuer().issue_at(&identity(Role::Admin), NOW).unwrap();
        let other = TokenIssuer::new(
            SecretString::from("a-different-key-with-enough-length-0123"),
            Duration::from_secs(900),
        );

        assert!(matches!(
            other.verify_at(&token, NOW),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let issuer = issuer();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(issuer.verify_at(token, NOW), Err(AuthError::InvalidToken)),
                "{token:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug_output = format!("{:?}", issuer());
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("kR9#"));
    }
}
