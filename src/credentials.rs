use std::time::Duration;

use crate::token::device_resource_uri;
use crate::{
    AuthConfig, AuthError, CertificateMaterial, ConnectionEndpoint, DeviceKey, PemSource,
    SasToken, SasTokenIssuer, TlsContext,
};

/// How a device proves its identity to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// Shared access signature tokens over a server-authenticated TLS session
    SasToken,
    /// An X.509 client certificate presented during a mutual TLS handshake
    X509Certificate,
}

#[derive(Debug)]
enum Mode {
    Sas {
        issuer: SasTokenIssuer,
        tls: TlsContext,
    },
    Certificate {
        certificate: CertificateMaterial,
        tls: TlsContext,
    },
}

/// Everything a transport needs to authenticate one device: a TLS context and, in SAS
/// mode, a token that renews itself when read after expiry
///
/// Exactly one authentication mode is live for the life of the value.
///
/// # Example
/// ```no_run
/// use azure_iot_device_auth::{AuthConfig, ConnectionEndpoint, CredentialSet};
///
/// let endpoint: ConnectionEndpoint =
///     "HostName=myhub.azure-devices.net;DeviceId=dev1;SharedAccessKey=c2VjcmV0"
///         .parse()
///         .unwrap();
/// let credentials = CredentialSet::from_sas(endpoint, AuthConfig::default()).unwrap();
///
/// let tls = credentials.tls_context();
/// let password = credentials.token();
/// ```
#[derive(Debug)]
pub struct CredentialSet {
    endpoint: ConnectionEndpoint,
    config: AuthConfig,
    mode: Mode,
}

impl CredentialSet {
    /// Create SAS-token credentials
    ///
    /// Mints the first token straight away when the endpoint carries a device key, otherwise
    /// adopts the endpoint's externally issued token. Fails with
    /// [`AuthError::InvalidArgument`] if the endpoint declares certificate authentication.
    pub fn from_sas(endpoint: ConnectionEndpoint, config: AuthConfig) -> crate::Result<Self> {
        if endpoint.uses_certificate_auth() {
            return Err(AuthError::InvalidArgument(
                "endpoint uses x509 authentication; supply a certificate and private key instead"
                    .to_string(),
            ));
        }

        let resource_uri = device_resource_uri(endpoint.host_name(), endpoint.device_id());
        let issuer = match (endpoint.shared_access_key(), endpoint.shared_access_token()) {
            (Some(key), _) => SasTokenIssuer::from_device_key(
                resource_uri,
                DeviceKey::from_base64(key)?,
                config.token_validity(),
                config.renewal_skew(),
            ),
            (None, Some(token)) => {
                SasTokenIssuer::from_token(token.parse::<SasToken>()?, config.token_validity())
            }
            (None, None) => {
                return Err(AuthError::InvalidArgument(
                    "endpoint carries neither a device key nor a shared access signature"
                        .to_string(),
                ))
            }
        };

        let tls = TlsContext::server_auth_only()?;

        info!(
            "Created SAS token credentials for IoT hub {}, device {}",
            endpoint.host_name(),
            endpoint.device_id()
        );

        Ok(Self {
            endpoint,
            config,
            mode: Mode::Sas { issuer, tls },
        })
    }

    /// Create X.509 certificate credentials
    ///
    /// Fails with [`AuthError::InvalidArgument`] if the endpoint does not declare
    /// certificate authentication, with the errors of [`CertificateMaterial::new`] when the
    /// material is missing or unreadable, and with [`AuthError::Io`] when it cannot be turned
    /// into a TLS context.
    pub fn from_x509(
        endpoint: ConnectionEndpoint,
        public_certificate: PemSource,
        private_key: PemSource,
        config: AuthConfig,
    ) -> crate::Result<Self> {
        if !endpoint.uses_certificate_auth() {
            return Err(AuthError::InvalidArgument(
                "endpoint does not use x509 authentication".to_string(),
            ));
        }

        let certificate = CertificateMaterial::new(public_certificate, private_key)?;
        let tls = TlsContext::mutual(&certificate)?;

        info!(
            "Created x509 certificate credentials for IoT hub {}, device {}",
            endpoint.host_name(),
            endpoint.device_id()
        );

        Ok(Self {
            endpoint,
            config,
            mode: Mode::Certificate { certificate, tls },
        })
    }

    ///
    pub fn auth_type(&self) -> AuthType {
        match self.mode {
            Mode::Sas { .. } => AuthType::SasToken,
            Mode::Certificate { .. } => AuthType::X509Certificate,
        }
    }

    /// The TLS context built when the credentials were created or last replaced
    pub fn tls_context(&self) -> &TlsContext {
        match &self.mode {
            Mode::Sas { tls, .. } | Mode::Certificate { tls, .. } => tls,
        }
    }

    /// The current SAS token, renewed first if it has expired and can be
    ///
    /// Always `None` for certificate credentials.
    pub fn token(&self) -> Option<String> {
        match &self.mode {
            Mode::Sas { issuer, .. } => Some(issuer.token()),
            Mode::Certificate { .. } => None,
        }
    }

    /// True when the SAS token has expired and there is no device key to renew it
    ///
    /// Transports should check this before reconnecting: the hub will reject the stale
    /// token. Certificate credentials never need renewal here.
    pub fn needs_renewal(&self) -> bool {
        match &self.mode {
            Mode::Sas { issuer, .. } => issuer.needs_renewal(),
            Mode::Certificate { .. } => false,
        }
    }

    /// Swap in a new certificate and key
    ///
    /// The new material and TLS context are built first and installed together; on failure
    /// the previous ones stay in place. Fails with [`AuthError::InvalidState`] for SAS
    /// credentials.
    pub fn replace_certificate(
        &mut self,
        public_certificate: PemSource,
        private_key: PemSource,
    ) -> crate::Result<()> {
        match &mut self.mode {
            Mode::Sas { .. } => Err(AuthError::InvalidState(
                "cannot replace the certificate of SAS token credentials",
            )),
            Mode::Certificate { certificate, tls } => {
                let replacement = CertificateMaterial::new(public_certificate, private_key)?;
                let replacement_tls = TlsContext::mutual(&replacement)?;

                *certificate = replacement;
                *tls = replacement_tls;

                info!(
                    "Replaced x509 certificate for device {}",
                    self.endpoint.device_id()
                );
                Ok(())
            }
        }
    }

    /// Install a SAS token issued elsewhere, typically to recover credentials that
    /// [need renewal](Self::needs_renewal)
    ///
    /// Fails with [`AuthError::InvalidCredential`] if `token` does not parse and with
    /// [`AuthError::InvalidState`] for certificate credentials. The TLS context is kept.
    pub fn replace_token(&self, token: &str) -> crate::Result<()> {
        match &self.mode {
            Mode::Sas { issuer, .. } => {
                issuer.set_token(token.parse::<SasToken>()?);
                info!(
                    "Replaced SAS token for device {}",
                    self.endpoint.device_id()
                );
                Ok(())
            }
            Mode::Certificate { .. } => Err(AuthError::InvalidState(
                "cannot install a SAS token on x509 certificate credentials",
            )),
        }
    }

    /// The device certificate and key, for certificate credentials
    pub fn certificate(&self) -> Option<&CertificateMaterial> {
        match &self.mode {
            Mode::Sas { .. } => None,
            Mode::Certificate { certificate, .. } => Some(certificate),
        }
    }

    /// The base64 device key, when SAS tokens are minted locally
    pub fn shared_key(&self) -> Option<&str> {
        match &self.mode {
            Mode::Sas { issuer, .. } => issuer.device_key().map(DeviceKey::as_str),
            Mode::Certificate { .. } => None,
        }
    }

    ///
    pub fn endpoint(&self) -> &ConnectionEndpoint {
        &self.endpoint
    }

    ///
    pub fn host_name(&self) -> &str {
        self.endpoint.host_name()
    }

    ///
    pub fn device_id(&self) -> &str {
        self.endpoint.device_id()
    }

    ///
    pub fn hub_name(&self) -> &str {
        self.endpoint.hub_name()
    }

    ///
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Lifetime of minted SAS tokens; `None` for certificate credentials
    pub fn token_validity(&self) -> Option<Duration> {
        match &self.mode {
            Mode::Sas { issuer, .. } => Some(issuer.validity()),
            Mode::Certificate { .. } => None,
        }
    }

    /// Change the lifetime of SAS tokens minted from now on
    ///
    /// Has no effect on certificate credentials.
    pub fn set_token_validity(&mut self, validity: Duration) {
        if let Mode::Sas { issuer, .. } = &mut self.mode {
            issuer.set_validity(validity);
            self.config.token_validity_secs = validity.as_secs();
        }
    }

    ///
    pub fn set_use_websocket(&mut self, use_websocket: bool) {
        self.config.use_websocket = use_websocket;
    }
}
