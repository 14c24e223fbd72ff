//! Device authentication for Azure IoT Hub clients
//!
//! A device proves its identity to the hub in one of two mutually exclusive ways:
//!
//! - **SAS tokens**: a short-lived `SharedAccessSignature` signed with the device key and sent
//!   as the transport password, over a TLS session that only authenticates the hub.
//! - **X.509 certificates**: the device's certificate and private key are presented during a
//!   mutual TLS handshake.
//!
//! [`CredentialSet`] holds one of these, builds the matching [`TlsContext`] up front and
//! hands out tokens that renew themselves when read after expiry. When a token expires and
//! there is no device key to mint a new one, [`CredentialSet::needs_renewal`] reports it so
//! the transport can stop before the hub rejects the connection.
//!
//! ## Feature flags
//!
//! - `mqtt-transport` (default): [`MqttConnectOptions`], the credentials an MQTT transport
//!   puts on the wire, including the CONNECT packet.
//!
//! # Examples
//!
//! A device that mints its own tokens
//! ```no_run
//! use azure_iot_device_auth::CredentialSet;
//!
//! let credentials = CredentialSet::builder()
//!     .connection_string("HostName=iothubname.azure-devices.net;DeviceId=MyDeviceId;SharedAccessKey=TheAccessKey")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! if !credentials.needs_renewal() {
//!     let connector = credentials.tls_context().async_connector();
//!     let password = credentials.token();
//!     // hand both to the transport
//! }
//! ```

#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

#[macro_use]
extern crate log;

/// IoT SDK package version
pub const SDK_VERSION: &str = std::env!("CARGO_PKG_VERSION");

/// Builder for device credentials
pub mod builder;
/// Device certificate and private key material
pub mod certificate;
/// Configuration and its defaults
pub mod config;
/// Device connection strings
pub mod connection_string;
/// The credential set handed to transports
pub mod credentials;
/// Errors
pub mod error;
/// TLS context construction
pub mod tls;
/// SAS token signing and renewal
pub mod token;
/// Connection options for transports
#[cfg(feature = "mqtt-transport")]
pub mod transport;
/// Embedded root certificate authorities
pub mod trust;

pub use builder::{
    CredentialSetBuilder, CredentialSetBuilderInitializedEndpoint,
    CredentialSetBuilderUninitializedEndpoint,
};
pub use certificate::{CertificateMaterial, PemSource};
pub use config::AuthConfig;
pub use connection_string::ConnectionEndpoint;
pub use credentials::{AuthType, CredentialSet};
pub use error::{AuthError, TlsError};
pub use tls::{TlsContext, TlsMode};
pub use token::{DeviceKey, SasToken, SasTokenIssuer};
#[cfg(feature = "mqtt-transport")]
pub use transport::MqttConnectOptions;
pub use trust::TrustAnchor;

/// Result type for the device authentication layer
pub type Result<T> = std::result::Result<T, AuthError>;
