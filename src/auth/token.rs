use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject of the token: the user's id.
    pub sub: Uuid,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: usize,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
}

/// Signs and verifies session tokens with the configured secret and lifetime.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issues a token for `user_id` that expires after the configured lifetime.
    ///
    /// # Returns
    /// The encoded JWT, or `AppError::InternalServerError` if encoding fails.
    pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            AppError::InternalServerError("Token lifetime is out of range".into())
        })?;
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a JWT string and decodes its claims.
    ///
    /// Signature and expiration are checked. Expired tokens and every other
    /// failure map to distinct `AppError::Unauthorized` messages.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation_and_verification() {
        let tokens = TokenService::new("test_secret_for_gen_verify", Duration::hours(1));
        let user_id = Uuid::new_v4();
        let token = tokens.issue(user_id).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_expiration() {
        let secret = "test_secret_for_expiration";
        let tokens = TokenService::new(secret, Duration::hours(1));

        let issued = Utc::now() - Duration::hours(3);
        let claims_expired = Claims {
            sub: Uuid::new_v4(),
            iat: issued.timestamp() as usize,
            exp: (issued + Duration::hours(1)).timestamp() as usize,
        };
        let expired_token = encode(
            &Header::default(),
            &claims_expired,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        match tokens.verify(&expired_token) {
            Err(AppError::Unauthorized(msg)) => {
                assert_eq!(msg, "Your token has expired. Please log in again!")
            }
            Ok(_) => panic!("Token should have been invalid due to expiration"),
            Err(e) => panic!("Unexpected error type for expired token: {:?}", e),
        }
    }

    #[test]
    fn test_invalid_token_signature() {
        let issuer = TokenService::new("one_secret", Duration::hours(1));
        let verifier = TokenService::new("a_completely_different_secret", Duration::hours(1));
        let token = issuer.issue(Uuid::new_v4()).unwrap();

        match verifier.verify(&token) {
            Err(AppError::Unauthorized(msg)) => {
                assert_eq!(msg, "Invalid token. Please log in again!")
            }
            Ok(_) => panic!("Token should have been invalid due to signature mismatch"),
            Err(e) => panic!("Unexpected error type for invalid signature: {:?}", e),
        }

        assert!(verifier.verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_unrepresentable_expiry_is_an_error() {
        let tokens = TokenService::new("secret", Duration::try_days(100_000_000_000).unwrap());
        assert!(matches!(
            tokens.issue(Uuid::new_v4()),
            Err(AppError::InternalServerError(_))
        ));
    }
}
