use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac, NewMac};
use sha2::Sha256;

use crate::AuthError;

const TOKEN_PREFIX: &str = "SharedAccessSignature ";
const RESOURCE_URI_FIELD: &str = "sr";
const SIGNATURE_FIELD: &str = "sig";
const EXPIRY_FIELD: &str = "se";
const MIN_RENEWAL_SKEW: Duration = Duration::from_secs(1);

/// Build the resource URI a device token is scoped to
pub fn device_resource_uri(host_name: &str, device_id: &str) -> String {
    format!("{}/devices/{}", host_name, device_id)
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// A device's long-lived shared secret, held decoded and ready to sign with
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceKey {
    encoded: String,
    bytes: Vec<u8>,
}

impl DeviceKey {
    /// Decode a base64 device key
    ///
    /// Decoding tolerates missing or extra padding and incomplete trailing symbols the way
    /// the hub's own tooling does. A key that decodes to nothing is rejected.
    pub fn from_base64(key: &str) -> crate::Result<Self> {
        let cleaned: String = key
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .collect();
        if !cleaned.is_ascii() {
            return Err(AuthError::InvalidCredential(
                "device key is not base64".to_string(),
            ));
        }

        // A lone trailing symbol carries fewer than eight bits and is dropped
        let usable = if cleaned.len() % 4 == 1 {
            cleaned.len() - 1
        } else {
            cleaned.len()
        };
        let bytes = base64::decode_config(
            &cleaned[..usable],
            base64::STANDARD_NO_PAD.decode_allow_trailing_bits(true),
        )
        .map_err(|e| AuthError::InvalidCredential(format!("device key is not base64: {}", e)))?;

        if bytes.is_empty() {
            return Err(AuthError::InvalidCredential(
                "device key cannot be empty".to_string(),
            ));
        }
        if base64::decode(key).is_err() {
            warn!("Device key is not canonical base64, decoded leniently");
        }

        Ok(Self {
            encoded: key.to_string(),
            bytes,
        })
    }

    /// The key as it was supplied
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    fn sign(&self, message: &[u8]) -> String {
        let mut mac =
            Hmac::<Sha256>::new_varkey(&self.bytes).expect("HMAC can take key of any size");
        mac.update(message);
        base64::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceKey(<redacted>)")
    }
}

/// A shared access signature: a bearer token proving possession of a device key until
/// `expiry`
///
/// Displays in the canonical form the hub parses,
/// `SharedAccessSignature sr=<uri>&sig=<signature>&se=<expiry>`.
#[derive(Clone, PartialEq, Eq)]
pub struct SasToken {
    resource_uri: String,
    signature: String,
    expiry: i64,
    encoded: String,
}

impl SasToken {
    /// Sign `resource_uri` with `key` until `expiry` (seconds since the epoch)
    pub fn sign(resource_uri: &str, key: &DeviceKey, expiry: i64) -> Self {
        let encoded_uri: String = form_urlencoded::byte_serialize(resource_uri.as_bytes()).collect();
        let to_sign = format!("{}\n{}", encoded_uri, expiry);
        let signature = key.sign(to_sign.as_bytes());
        let encoded_signature: String =
            form_urlencoded::byte_serialize(signature.as_bytes()).collect();

        let encoded = format!(
            "{}{}={}&{}={}&{}={}",
            TOKEN_PREFIX,
            RESOURCE_URI_FIELD,
            encoded_uri,
            SIGNATURE_FIELD,
            encoded_signature,
            EXPIRY_FIELD,
            expiry
        );

        Self {
            resource_uri: resource_uri.to_string(),
            signature,
            expiry,
            encoded,
        }
    }

    /// Sign a token valid for `validity` from now
    pub fn issue(resource_uri: &str, key: &DeviceKey, validity: Duration) -> Self {
        Self::sign(resource_uri, key, now().saturating_add(seconds(validity)))
    }

    /// The resource the token is scoped to, decoded
    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    /// The base64 signature, decoded from its URL form
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Expiry as seconds since the Unix epoch
    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    ///
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now())
    }

    /// A token whose expiry is at or before `now` is expired
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry <= now
    }
}

impl FromStr for SasToken {
    type Err = AuthError;

    /// Parse an externally issued token, keeping its exact text
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let fields = token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
            AuthError::InvalidCredential(format!(
                "shared access signature must start with `{}`",
                TOKEN_PREFIX.trim_end()
            ))
        })?;

        let mut resource_uri = None;
        let mut signature = None;
        let mut expiry = None;
        for (name, value) in form_urlencoded::parse(fields.as_bytes()) {
            match &*name {
                RESOURCE_URI_FIELD => resource_uri = Some(value.into_owned()),
                SIGNATURE_FIELD => signature = Some(value.into_owned()),
                EXPIRY_FIELD => {
                    expiry = Some(value.parse::<i64>().map_err(|_| {
                        AuthError::InvalidCredential(format!(
                            "shared access signature expiry `{}` is not a timestamp",
                            value
                        ))
                    })?)
                }
                _ => (),
            }
        }

        match (resource_uri, signature, expiry) {
            (Some(resource_uri), Some(signature), Some(expiry)) => Ok(Self {
                resource_uri,
                signature,
                expiry,
                encoded: token.to_string(),
            }),
            _ => Err(AuthError::InvalidCredential(format!(
                "shared access signature must carry {}, {} and {}",
                RESOURCE_URI_FIELD, SIGNATURE_FIELD, EXPIRY_FIELD
            ))),
        }
    }
}

impl fmt::Display for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl fmt::Debug for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasToken")
            .field("resource_uri", &self.resource_uri)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl From<SasToken> for String {
    fn from(token: SasToken) -> Self {
        token.encoded
    }
}

/// Holds the current SAS token for one device and renews it on demand
///
/// Renewal is lazy: [`SasTokenIssuer::token`] replaces an expired token when a device key is
/// available. Checking, minting and installing happen under one lock, so concurrent callers
/// see at most one renewal.
pub struct SasTokenIssuer {
    resource_uri: String,
    device_key: Option<DeviceKey>,
    validity: Duration,
    renewal_skew: Duration,
    current: Mutex<SasToken>,
    stuck_reported: AtomicBool,
}

impl SasTokenIssuer {
    /// An issuer that mints its first token immediately and renews from `device_key`
    ///
    /// Renewed tokens expire `validity + renewal_skew` from the moment of renewal; a skew
    /// below one second is raised to one second so a renewed token is never already expired.
    pub fn from_device_key(
        resource_uri: String,
        device_key: DeviceKey,
        validity: Duration,
        renewal_skew: Duration,
    ) -> Self {
        let token = SasToken::issue(&resource_uri, &device_key, validity);
        Self {
            resource_uri,
            device_key: Some(device_key),
            validity,
            renewal_skew: renewal_skew.max(MIN_RENEWAL_SKEW),
            current: Mutex::new(token),
            stuck_reported: AtomicBool::new(false),
        }
    }

    /// An issuer wrapping a token minted elsewhere; it can never renew
    pub fn from_token(token: SasToken, validity: Duration) -> Self {
        Self {
            resource_uri: token.resource_uri().to_string(),
            device_key: None,
            validity,
            renewal_skew: MIN_RENEWAL_SKEW,
            current: Mutex::new(token),
            stuck_reported: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SasToken> {
        // Tokens are replaced whole, so a panicked holder cannot leave one half written
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mint a fresh token valid for the configured validity, without installing it
    ///
    /// Returns `None` when there is no device key to sign with.
    pub fn issue(&self) -> Option<SasToken> {
        self.device_key
            .as_ref()
            .map(|key| SasToken::issue(&self.resource_uri, key, self.validity))
    }

    /// The serialized current token, renewed first if it has expired and a device key is
    /// present
    ///
    /// Without a device key an expired token is returned unchanged; see
    /// [`SasTokenIssuer::needs_renewal`].
    pub fn token(&self) -> String {
        let mut current = self.lock();
        let now = now();
        if current.is_expired_at(now) {
            if let Some(key) = &self.device_key {
                let expiry = now
                    .saturating_add(seconds(self.validity))
                    .saturating_add(seconds(self.renewal_skew));
                *current = SasToken::sign(&self.resource_uri, key, expiry);
                debug!("Renewed SAS token for {}, expires at {}", self.resource_uri, expiry);
            }
        }
        current.to_string()
    }

    /// A copy of the current token, without renewing it
    pub fn current(&self) -> SasToken {
        self.lock().clone()
    }

    /// Install a token minted elsewhere in place of the current one
    ///
    /// This is how a caller recovers an issuer that [needs renewal](Self::needs_renewal).
    /// Keyed issuers accept it too and renew from it once it expires.
    pub fn set_token(&self, token: SasToken) {
        let mut current = self.lock();
        *current = token;
        self.stuck_reported.store(false, Ordering::Relaxed);
        debug!(
            "Installed SAS token for {}, expires at {}",
            self.resource_uri,
            current.expiry()
        );
    }

    /// True when the current token has expired and there is no key to mint another
    ///
    /// Logs a warning the first time the issuer is found stuck, not on every poll.
    pub fn needs_renewal(&self) -> bool {
        let stuck = self.device_key.is_none() && self.lock().is_expired();
        if stuck && !self.stuck_reported.swap(true, Ordering::Relaxed) {
            warn!(
                "SAS token for {} has expired and no device key is available to renew it",
                self.resource_uri
            );
        }
        stuck
    }

    ///
    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    ///
    pub fn device_key(&self) -> Option<&DeviceKey> {
        self.device_key.as_ref()
    }

    /// Lifetime given to each minted token
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Change the lifetime of tokens minted from now on; the current token is untouched
    pub fn set_validity(&mut self, validity: Duration) {
        self.validity = validity;
    }
}

impl fmt::Debug for SasTokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasTokenIssuer")
            .field("resource_uri", &self.resource_uri)
            .field("can_renew", &self.device_key.is_some())
            .field("validity", &self.validity)
            .field("renewal_skew", &self.renewal_skew)
            .finish()
    }
}
