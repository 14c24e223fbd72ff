use std::fmt;

use native_tls::{Identity, Protocol, TlsConnector, TlsConnectorBuilder};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::x509::X509;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::{CertificateMaterial, TlsError, TrustAnchor};

const MIN_PROTOCOL_VERSION: Protocol = Protocol::Tlsv12;
const IDENTITY_ALIAS: &str = "key-alias";
const TEMPORARY_PASSWORD_LEN: usize = 32;

/// Which peers present certificates during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Only the hub proves its identity; the device authenticates with a SAS token
    ServerAuthOnly,
    /// Both the hub and the device present certificates
    Mutual,
}

/// A TLS client context bound to the embedded trust anchors and, in mutual mode, to the
/// device's certificate and key
///
/// Cloning is cheap; clones share the underlying platform context.
#[derive(Clone)]
pub struct TlsContext {
    mode: TlsMode,
    connector: TlsConnector,
}

impl TlsContext {
    /// Build a context that verifies the hub against the embedded roots and presents no
    /// client identity
    pub fn server_auth_only() -> Result<Self, TlsError> {
        trace!("Building server-auth-only TLS context");
        let connector = trusting_builder()?.build()?;
        Ok(Self {
            mode: TlsMode::ServerAuthOnly,
            connector,
        })
    }

    /// Build a context that also presents `material` to the hub
    pub fn mutual(material: &CertificateMaterial) -> Result<Self, TlsError> {
        trace!("Building mutual TLS context");
        let identity = client_identity(material)?;
        let connector = trusting_builder()?.identity(identity).build()?;
        Ok(Self {
            mode: TlsMode::Mutual,
            connector,
        })
    }

    ///
    pub fn mode(&self) -> TlsMode {
        self.mode
    }

    /// Whether the device presents a certificate during the handshake
    pub fn has_client_identity(&self) -> bool {
        self.mode == TlsMode::Mutual
    }

    /// The blocking connector, for transports that drive `std::net` sockets
    pub fn connector(&self) -> &TlsConnector {
        &self.connector
    }

    /// A connector for transports running on tokio
    pub fn async_connector(&self) -> tokio_native_tls::TlsConnector {
        tokio_native_tls::TlsConnector::from(self.connector.clone())
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("mode", &self.mode)
            .finish()
    }
}

fn trusting_builder() -> Result<TlsConnectorBuilder, TlsError> {
    let mut builder = TlsConnector::builder();
    builder
        .min_protocol_version(Some(MIN_PROTOCOL_VERSION))
        .disable_built_in_roots(true);
    for anchor in TrustAnchor::certificates()? {
        builder.add_root_certificate(anchor);
    }
    Ok(builder)
}

/// Pack the certificate and key into an in-memory PKCS#12 store
///
/// The store is sealed with a password generated for this call alone. The password is
/// never persisted, logged or returned.
fn client_identity(material: &CertificateMaterial) -> Result<Identity, TlsError> {
    let certificate = X509::from_pem(material.public_certificate().as_bytes())
        .map_err(|e| TlsError::parse("public key certificate", e))?;
    let key = PKey::private_key_from_pem(material.private_key().as_bytes())
        .map_err(|e| TlsError::parse("private key", e))?;

    let password = temporary_password();
    let store = Pkcs12::builder()
        .name(IDENTITY_ALIAS)
        .pkey(&key)
        .cert(&certificate)
        .build2(&password)
        .map_err(|e| TlsError::parse("certificate and private key pair", e))?;
    let der = store
        .to_der()
        .map_err(|e| TlsError::parse("certificate and private key pair", e))?;

    Ok(Identity::from_pkcs12(&der, &password)?)
}

fn temporary_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PemSource;

    const DEVICE_CERT: &str = include_str!("../tests/data/device_cert.pem");
    const DEVICE_KEY: &str = include_str!("../tests/data/device_key.pem");
    const OTHER_KEY: &str = include_str!("../tests/data/other_key.pem");

    fn material(cert: &str, key: &str) -> CertificateMaterial {
        CertificateMaterial::new(PemSource::literal(cert), PemSource::literal(key)).unwrap()
    }

    #[test]
    fn server_auth_only_has_no_identity() {
        let context = TlsContext::server_auth_only().unwrap();
        assert_eq!(context.mode(), TlsMode::ServerAuthOnly);
        assert!(!context.has_client_identity());
    }

    #[test]
    fn mutual_context_carries_identity() {
        let context = TlsContext::mutual(&material(DEVICE_CERT, DEVICE_KEY)).unwrap();
        assert_eq!(context.mode(), TlsMode::Mutual);
        assert!(context.has_client_identity());
    }

    #[test]
    fn malformed_certificate_is_a_parse_failure() {
        let result = TlsContext::mutual(&material("not a certificate", DEVICE_KEY));
        assert!(matches!(
            result,
            Err(TlsError::CertificateParse {
                what: "public key certificate",
                ..
            })
        ));
    }

    #[test]
    fn malformed_key_is_a_parse_failure() {
        let result = TlsContext::mutual(&material(DEVICE_CERT, "not a key"));
        assert!(matches!(
            result,
            Err(TlsError::CertificateParse {
                what: "private key",
                ..
            })
        ));
    }

    #[test]
    fn key_from_another_pair_is_rejected() {
        let result = TlsContext::mutual(&material(DEVICE_CERT, OTHER_KEY));
        assert!(matches!(result, Err(TlsError::CertificateParse { .. })));
    }

    #[test]
    fn temporary_passwords_are_not_reused() {
        let first = temporary_password();
        let second = temporary_password();
        assert_eq!(first.len(), TEMPORARY_PASSWORD_LEN);
        assert_ne!(first, second);
    }

    #[test]
    fn debug_output_is_opaque() {
        let context = TlsContext::server_auth_only().unwrap();
        assert_eq!(format!("{:?}", context), "TlsContext { mode: ServerAuthOnly }");
    }
}
