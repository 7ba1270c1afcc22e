use std::ops::Deref;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;

use super::principal::Principal;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token proving the identity of the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(flatten)]
    pub principal: Principal,
}

impl AuthToken {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    /// Sign this token, valid for the configured session lifetime.
    pub fn encode(self, config: &Config) -> String {
        self.encode_until(Utc::now() + config.auth_ttl(), config)
    }

    #[allow(clippy::missing_panics_doc)]
    fn encode_until(self, expire_at: DateTime<Utc>, config: &Config) -> String {
        let claims = Claims {
            token: self,
            expire_at,
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }

    /// Verify a signed token and extract the principal it vouches for.
    pub fn decode(token: &str, config: &Config) -> Result<Self, Error> {
        Ok(decode_claims(token, config)?.token)
    }

    /// Verify a token from the identity provider, also returning the time
    /// it expires.
    pub fn verify(token: &str, config: &Config) -> Result<(Self, DateTime<Utc>), Error> {
        let claims = decode_claims(token, config)?;
        Ok((claims.token, claims.expire_at))
    }

    /// Serialize this token into a session cookie, which expires after the
    /// configured session lifetime or at `not_after`, whichever is sooner.
    ///
    /// Store it with `add_private`, so its value cannot be replayed as an
    /// identity token to extend the session.
    pub fn into_cookie(self, config: &Config, not_after: DateTime<Utc>) -> Cookie<'static> {
        let now = Utc::now();
        let expire_at = (now + config.auth_ttl()).min(not_after);
        let max_age = (expire_at - now).num_seconds().max(0);
        Cookie::build(AUTH_TOKEN_COOKIE, self.encode_until(expire_at, config))
            .max_age(Duration::seconds(max_age))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }
}

fn decode_claims(token: &str, config: &Config) -> Result<Claims, Error> {
    let claims = jsonwebtoken::decode(
        token,
        &DecodingKey::from_secret(config.jwt_secret()),
        &Validation::default(),
    )
    .map(|claims: TokenData<Claims>| claims.claims)?;
    Ok(claims)
}

impl Deref for AuthToken {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.principal
    }
}

/// Token claims: the principal plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the session cookie, falling back to an
    /// `Authorization: Bearer` header.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = req
            .cookies()
            .get_private(AUTH_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string());
        let bearer = req
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);
        let Some(raw) = cookie.or(bearer) else {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthenticated("Not signed in".to_string()),
            ));
        };

        match Self::decode(&raw, config) {
            Ok(token) => Outcome::Success(token),
            Err(e) => Outcome::Failure((Status::Unauthorized, e)),
        }
    }
}
