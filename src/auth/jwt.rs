use std::str::FromStr;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::config::JwtConfig;

/// Skew tolerated between the issuing and verifying clocks.
const LEEWAY_SECS: u64 = 60;

/// Claim set carried by an access token. The subject is the user id,
/// serialized as a string on the wire. Expiry is mandatory.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signing and verification keys, built once from configuration.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl_minutes: i64,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> anyhow::Result<Self> {
        let algorithm = Algorithm::from_str(&cfg.algorithm)
            .map_err(|_| anyhow::anyhow!("unknown JWT algorithm {:?}", cfg.algorithm))?;
        // Secret-based keys only; asymmetric algorithms would need key files.
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            anyhow::bail!("unsupported JWT algorithm {:?}", cfg.algorithm);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm,
            ttl_minutes: cfg.ttl_minutes,
        })
    }

    pub fn sign(&self, user_id: i32) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::minutes(self.ttl_minutes);
        let claims = Claims {
            id: user_id.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(%user_id, "jwt signed");
        Ok(token)
    }

    /// Rejects malformed tokens, bad signatures and expired tokens alike;
    /// the boundary collapses all of them to a single unauthorized outcome.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = LEEWAY_SECS;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.id, "jwt verified");
        Ok(data.claims)
    }
}
