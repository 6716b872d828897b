//! Request authentication for brokerage REST APIs.
//!
//! Two schemes are supported:
//! - Signed-REST: HMAC-SHA256 over `timestamp + method + path + body`,
//!   hex-encoded and sent with key and timestamp headers.
//! - Bearer-token: `Authorization: Bearer <token>`.
//!
//! Secrets are loaded once at startup and kept in `Zeroizing` buffers.
//! Never log secret material.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{BrokerError, BrokerResult};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// SecretSource
// =============================================================================

/// Where a secret value comes from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Read from an environment variable at load time.
    EnvVar { var_name: String },
    /// Value supplied directly (tests, embedded configs).
    Inline(String),
}

impl SecretSource {
    pub fn env(var_name: impl Into<String>) -> Self {
        Self::EnvVar {
            var_name: var_name.into(),
        }
    }

    /// Resolve the secret. Leading/trailing whitespace is trimmed.
    pub fn load(&self) -> BrokerResult<Zeroizing<String>> {
        let raw = match self {
            Self::EnvVar { var_name } => Zeroizing::new(
                std::env::var(var_name)
                    .map_err(|_| BrokerError::MissingCredential(var_name.clone()))?,
            ),
            Self::Inline(value) => Zeroizing::new(value.clone()),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BrokerError::MissingCredential(self.describe()));
        }
        Ok(Zeroizing::new(trimmed.to_string()))
    }

    fn describe(&self) -> String {
        match self {
            Self::EnvVar { var_name } => var_name.clone(),
            Self::Inline(_) => "<inline>".to_string(),
        }
    }
}

// =============================================================================
// HmacSigner
// =============================================================================

/// Headers produced for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub access_key: String,
    pub timestamp: String,
    pub signature: String,
}

/// HMAC-SHA256 request signer for the signed-REST scheme.
pub struct HmacSigner {
    api_key: Zeroizing<String>,
    api_secret: Zeroizing<String>,
}

impl HmacSigner {
    pub fn new(api_key: Zeroizing<String>, api_secret: Zeroizing<String>) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Load key and secret from their sources.
    pub fn load(key: &SecretSource, secret: &SecretSource) -> BrokerResult<Self> {
        Ok(Self::new(key.load()?, secret.load()?))
    }

    /// Hex-encoded HMAC-SHA256 of `timestamp + method + path + body`.
    ///
    /// `path` includes the query string for GET requests.
    pub fn signature(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> BrokerResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| BrokerError::Signing(format!("invalid key length: {e}")))?;
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(path.as_bytes());
        mac.update(body.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Sign a request stamped with the current Unix time (seconds).
    pub fn sign(&self, method: &str, path: &str, body: &str) -> BrokerResult<SignedHeaders> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.signature(&timestamp, method, path, body)?;
        Ok(SignedHeaders {
            access_key: self.api_key.to_string(),
            timestamp,
            signature,
        })
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// BearerToken
// =============================================================================

/// Bearer token for the bearer-token scheme.
pub struct BearerToken(Zeroizing<String>);

impl BearerToken {
    pub fn new(token: Zeroizing<String>) -> Self {
        Self(token)
    }

    pub fn load(source: &SecretSource) -> BrokerResult<Self> {
        Ok(Self(source.load()?))
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("Bearer {}", self.0.as_str()))
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}
