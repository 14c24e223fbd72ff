use std::marker::PhantomData;
use std::time::Duration;

use crate::{AuthConfig, ConnectionEndpoint, CredentialSet, PemSource};

impl CredentialSet {
    /// Get a builder for device credentials
    pub fn builder() -> CredentialSetBuilder<CredentialSetBuilderUninitializedEndpoint> {
        CredentialSetBuilder::default()
    }
}

/// The builder has no endpoint yet and requires one
#[derive(Debug)]
pub struct CredentialSetBuilderUninitializedEndpoint;
/// The builder has an endpoint and can be built
#[derive(Debug)]
pub struct CredentialSetBuilderInitializedEndpoint;

/// Builder for [`CredentialSet`]
///
/// # Example
/// ```no_run
/// use azure_iot_device_auth::{CredentialSet, PemSource};
///
/// let credentials = CredentialSet::builder()
///     .connection_string("HostName=myhub.azure-devices.net;DeviceId=dev1;x509=true")
///     .unwrap()
///     .x509_certificate(
///         PemSource::path("/etc/device/cert.pem"),
///         PemSource::path("/etc/device/key.pem"),
///     )
///     .build()
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct CredentialSetBuilder<T> {
    endpoint: Option<ConnectionEndpoint>,
    config: AuthConfig,
    certificate: Option<(PemSource, PemSource)>,
    _phantom: PhantomData<T>,
}

impl Default for CredentialSetBuilder<CredentialSetBuilderUninitializedEndpoint> {
    fn default() -> CredentialSetBuilder<CredentialSetBuilderUninitializedEndpoint> {
        Self {
            endpoint: None,
            config: AuthConfig::default(),
            certificate: None,
            _phantom: Default::default(),
        }
    }
}

impl<T> CredentialSetBuilder<T> {
    /// Replace the whole configuration
    pub fn config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the lifetime of minted SAS tokens
    pub fn token_validity(mut self, validity: Duration) -> Self {
        self.config = self.config.with_token_validity(validity);
        self
    }
}

impl CredentialSetBuilder<CredentialSetBuilderUninitializedEndpoint> {
    /// Use an already parsed endpoint
    pub fn endpoint(
        self,
        endpoint: ConnectionEndpoint,
    ) -> CredentialSetBuilder<CredentialSetBuilderInitializedEndpoint> {
        CredentialSetBuilder {
            endpoint: Some(endpoint),
            config: self.config,
            certificate: self.certificate,
            _phantom: Default::default(),
        }
    }

    /// Parse the endpoint from a device connection string
    pub fn connection_string<T>(
        self,
        connection_string: T,
    ) -> crate::Result<CredentialSetBuilder<CredentialSetBuilderInitializedEndpoint>>
    where
        T: AsRef<str>,
    {
        let endpoint = connection_string.as_ref().parse::<ConnectionEndpoint>()?;
        Ok(self.endpoint(endpoint))
    }
}

impl CredentialSetBuilder<CredentialSetBuilderInitializedEndpoint> {
    /// Authenticate with an X.509 certificate and private key
    pub fn x509_certificate(mut self, public_certificate: PemSource, private_key: PemSource) -> Self {
        self.certificate = Some((public_certificate, private_key));
        self
    }

    /// Build the credentials
    ///
    /// Certificate material selects [`CredentialSet::from_x509`], otherwise
    /// [`CredentialSet::from_sas`] is used. Either constructor rejects an endpoint declaring
    /// the other mode.
    pub fn build(self) -> crate::Result<CredentialSet> {
        let endpoint = self.endpoint.ok_or_else(|| {
            crate::AuthError::InvalidArgument("endpoint must be initialized".to_string())
        })?;

        match self.certificate {
            Some((public_certificate, private_key)) => {
                CredentialSet::from_x509(endpoint, public_certificate, private_key, self.config)
            }
            None => CredentialSet::from_sas(endpoint, self.config),
        }
    }
}
