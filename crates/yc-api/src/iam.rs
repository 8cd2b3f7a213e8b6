use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Audience every service-account JWT must be issued for.
pub const IAM_AUDIENCE: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";

/// Lifetime of a signed JWT. The IAM endpoint rejects anything above one hour.
const JWT_TTL_SECS: i64 = 3600;

/// Authorized key of a service account, as exported by `yc iam key create`.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub id: String,
    pub service_account_id: String,
    pub private_key: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("id", &self.id)
            .field("service_account_id", &self.service_account_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(Error::InvalidKey)
    }

    /// The PEM block of the private key.
    ///
    /// Keys created by newer CLI versions carry a
    /// `PLEASE DO NOT REMOVE THIS LINE!` preamble before the PEM header.
    fn private_key_pem(&self) -> &str {
        match self.private_key.find("-----BEGIN") {
            Some(start) => &self.private_key[start..],
            None => &self.private_key,
        }
    }

    /// Sign a PS256 JWT that can be exchanged for an IAM token.
    pub fn sign_jwt(&self, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = JwtClaims {
            aud: IAM_AUDIENCE.to_string(),
            iss: self.service_account_id.clone(),
            iat,
            exp: (now + Duration::seconds(JWT_TTL_SECS)).timestamp(),
        };

        let header = Header {
            kid: Some(self.id.clone()),
            ..Header::new(Algorithm::PS256)
        };
        let key = EncodingKey::from_rsa_pem(self.private_key_pem().as_bytes())?;

        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }
}
