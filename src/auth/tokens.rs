use chrono::{Duration, Utc};
use jsonwebtoken::errors::Error as JwtError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::models::User;

/// Claims of the short-lived token: the user's identity.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    pub fullname: String,
    pub exp: i64,
}

/// Claims of the long-lived token: the user id plus a unique token id, so
/// every rotation yields a different token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub exp: i64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: i64,
}

impl SigningKeys {
    fn new(secret: &str, expiry: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    fn expires_at(&self) -> i64 {
        (Utc::now() + Duration::seconds(self.expiry)).timestamp()
    }
}

/// Issues and verifies access and refresh tokens, each with its own secret
/// and lifetime.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access: SigningKeys::new(&config.access_token_secret, config.access_token_expiry),
            refresh: SigningKeys::new(&config.refresh_token_secret, config.refresh_token_expiry),
        }
    }

    pub fn generate_access_token(&self, user: &User) -> Result<String, JwtError> {
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            fullname: user.fullname.clone(),
            exp: self.access.expires_at(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.access.encoding)
    }

    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            exp: self.refresh.expires_at(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.refresh.encoding)
    }

    pub fn generate_pair(&self, user: &User) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user)?,
            refresh_token: self.generate_refresh_token(user.id)?,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        decode::<AccessClaims>(token, &self.access.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        decode::<RefreshClaims>(token, &self.refresh.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn sample_user() -> User {
        let now = Utc::now().naive_utc();
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            fullname: "Alice Doe".into(),
            avatar: "http://localhost/uploads/images/a.png".into(),
            cover_image: None,
            password_hash: "hash".into(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn access_token_carries_identity() {
        let service = TokenService::new(&AppConfig::for_tests().auth);
        let user = sample_user();

        let token = service.generate_access_token(&user).unwrap();
        let claims = service.verify_access_token(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.fullname, "Alice Doe");
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let service = TokenService::new(&AppConfig::for_tests().auth);
        let user = sample_user();
        let pair = service.generate_pair(&user).unwrap();

        assert!(service.verify_access_token(&pair.refresh_token).is_err());
        assert!(service.verify_refresh_token(&pair.access_token).is_err());
        assert_eq!(service.verify_refresh_token(&pair.refresh_token).unwrap().sub, user.id);
    }

    #[test]
    fn refresh_tokens_differ_within_the_same_second() {
        let service = TokenService::new(&AppConfig::for_tests().auth);
        let user_id = Uuid::new_v4();

        let first = service.generate_refresh_token(user_id).unwrap();
        let second = service.generate_refresh_token(user_id).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut auth = AppConfig::for_tests().auth;
        // Past the default validation leeway.
        auth.access_token_expiry = -300;
        let service = TokenService::new(&auth);

        let token = service.generate_access_token(&sample_user()).unwrap();
        assert!(service.verify_access_token(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let service = TokenService::new(&AppConfig::for_tests().auth);
        assert!(service.verify_access_token("invalid.jwt.token").is_err());
    }
}
