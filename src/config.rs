use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TOKEN_VALIDITY_SECS: u64 = 3600;
const DEFAULT_TOKEN_RENEWAL_SKEW_SECS: u64 = 1;
const MIN_TOKEN_RENEWAL_SKEW_SECS: u64 = 1;
const DEFAULT_READ_TIMEOUT_MS: u64 = 240_000;
const DEFAULT_MESSAGE_LOCK_TIMEOUT_SECS: u64 = 180;

/// Tunables for a device's credentials and the transport that consumes them
///
/// Every field has a default, so a partial document deserializes cleanly:
///
/// ```
/// use azure_iot_device_auth::AuthConfig;
///
/// let config: AuthConfig = serde_json::from_str(r#"{ "token_validity_secs": 600 }"#).unwrap();
/// assert_eq!(config.token_validity().as_secs(), 600);
/// assert_eq!(config.read_timeout().as_millis(), 240_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of each minted SAS token, in seconds
    pub token_validity_secs: u64,
    /// Extra seconds added to a renewed token's expiry to absorb clock drift against the hub;
    /// values below one are treated as one
    pub token_renewal_skew_secs: u64,
    /// How long the transport waits on a read before giving up, in milliseconds
    pub read_timeout_ms: u64,
    /// How long a received message stays locked before it must be settled, in seconds
    pub message_lock_timeout_secs: u64,
    /// Whether the transport should tunnel over websockets
    pub use_websocket: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_validity_secs: DEFAULT_TOKEN_VALIDITY_SECS,
            token_renewal_skew_secs: DEFAULT_TOKEN_RENEWAL_SKEW_SECS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            message_lock_timeout_secs: DEFAULT_MESSAGE_LOCK_TIMEOUT_SECS,
            use_websocket: false,
        }
    }
}

impl AuthConfig {
    /// Set the lifetime of minted SAS tokens
    pub fn with_token_validity(mut self, validity: Duration) -> Self {
        self.token_validity_secs = validity.as_secs();
        self
    }

    /// Set the extra seconds added to renewed tokens
    pub fn with_renewal_skew(mut self, skew: Duration) -> Self {
        self.token_renewal_skew_secs = skew.as_secs();
        self
    }

    /// Enable or disable websocket tunnelling
    pub fn with_websocket(mut self, use_websocket: bool) -> Self {
        self.use_websocket = use_websocket;
        self
    }

    ///
    pub fn token_validity(&self) -> Duration {
        Duration::from_secs(self.token_validity_secs)
    }

    /// The renewal skew, never less than one second
    pub fn renewal_skew(&self) -> Duration {
        Duration::from_secs(self.token_renewal_skew_secs.max(MIN_TOKEN_RENEWAL_SKEW_SECS))
    }

    ///
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    ///
    pub fn message_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.message_lock_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AuthConfig::default();
        assert_eq!(config.token_validity(), Duration::from_secs(3600));
        assert_eq!(config.renewal_skew(), Duration::from_secs(1));
        assert_eq!(config.read_timeout(), Duration::from_millis(240_000));
        assert_eq!(config.message_lock_timeout(), Duration::from_secs(180));
        assert!(!config.use_websocket);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: AuthConfig =
            serde_json::from_str(r#"{ "use_websocket": true, "read_timeout_ms": 1000 }"#).unwrap();
        assert!(config.use_websocket);
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.token_validity(), Duration::from_secs(3600));
    }

    #[test]
    fn builder_methods_override() {
        let config = AuthConfig::default()
            .with_token_validity(Duration::from_secs(60))
            .with_renewal_skew(Duration::from_secs(0))
            .with_websocket(true);
        assert_eq!(config.token_validity_secs, 60);
        assert_eq!(config.token_renewal_skew_secs, 0);
        assert!(config.use_websocket);
    }

    #[test]
    fn renewal_skew_has_a_floor_of_one_second() {
        let config = AuthConfig::default().with_renewal_skew(Duration::from_secs(0));
        assert_eq!(config.renewal_skew(), Duration::from_secs(1));

        let config: AuthConfig =
            serde_json::from_str(r#"{ "token_renewal_skew_secs": 0 }"#).unwrap();
        assert_eq!(config.renewal_skew(), Duration::from_secs(1));
    }
}
