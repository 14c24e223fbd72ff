use std::fmt;
use std::str::FromStr;

use crate::AuthError;

const HOSTNAME_KEY: &str = "HostName";
const DEVICEID_KEY: &str = "DeviceId";
const SHAREDACCESSKEY_KEY: &str = "SharedAccessKey";
const SHAREDACCESSSIGNATURE_KEY: &str = "SharedAccessSignature";
const X509_KEY: &str = "x509";

/// The parsed identity of a device: which hub it talks to, who it is, and what it
/// authenticates with
///
/// A descriptor with `x509=true` authenticates with a certificate; any key or signature it
/// also carries is dropped.
///
/// # Example
/// ```
/// use azure_iot_device_auth::ConnectionEndpoint;
///
/// let endpoint: ConnectionEndpoint =
///     "HostName=myhub.azure-devices.net;DeviceId=dev1;SharedAccessKey=c2VjcmV0"
///         .parse()
///         .unwrap();
/// assert_eq!(endpoint.hub_name(), "myhub");
/// assert!(!endpoint.uses_certificate_auth());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionEndpoint {
    host_name: String,
    device_id: String,
    hub_name: String,
    shared_access_key: Option<String>,
    shared_access_token: Option<String>,
    uses_certificate_auth: bool,
}

impl ConnectionEndpoint {
    /// An endpoint that mints its own SAS tokens from a device key
    pub fn with_shared_key<T>(host_name: T, device_id: T, shared_access_key: T) -> crate::Result<Self>
    where
        T: Into<String>,
    {
        Self::new(
            host_name.into(),
            device_id.into(),
            Some(shared_access_key.into()),
            None,
            false,
        )
    }

    /// An endpoint that authenticates with a token issued elsewhere
    pub fn with_shared_access_token<T>(
        host_name: T,
        device_id: T,
        shared_access_token: T,
    ) -> crate::Result<Self>
    where
        T: Into<String>,
    {
        Self::new(
            host_name.into(),
            device_id.into(),
            None,
            Some(shared_access_token.into()),
            false,
        )
    }

    /// An endpoint that authenticates with an X.509 client certificate
    pub fn with_certificate<T>(host_name: T, device_id: T) -> crate::Result<Self>
    where
        T: Into<String>,
    {
        Self::new(host_name.into(), device_id.into(), None, None, true)
    }

    fn new(
        host_name: String,
        device_id: String,
        shared_access_key: Option<String>,
        shared_access_token: Option<String>,
        uses_certificate_auth: bool,
    ) -> crate::Result<Self> {
        if host_name.is_empty() {
            return Err(AuthError::InvalidArgument(format!(
                "{} must not be empty",
                HOSTNAME_KEY
            )));
        }
        if device_id.is_empty() {
            return Err(AuthError::InvalidArgument(format!(
                "{} must not be empty",
                DEVICEID_KEY
            )));
        }

        let (shared_access_key, shared_access_token) = if uses_certificate_auth {
            if shared_access_key.is_some() || shared_access_token.is_some() {
                debug!("Ignoring shared access credentials of an x509 endpoint");
            }
            (None, None)
        } else {
            match (shared_access_key, shared_access_token) {
                (Some(_), Some(_)) | (None, None) => {
                    return Err(AuthError::InvalidArgument(format!(
                        "exactly one of {}, {} or {}=true must be given",
                        SHAREDACCESSKEY_KEY, SHAREDACCESSSIGNATURE_KEY, X509_KEY
                    )))
                }
                credentials => credentials,
            }
        };

        let hub_name = host_name
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            host_name,
            device_id,
            hub_name,
            shared_access_key,
            shared_access_token,
            uses_certificate_auth,
        })
    }

    /// Fully qualified host name of the hub, e.g. `myhub.azure-devices.net`
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    ///
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The hub name: the host name up to its first `.`
    pub fn hub_name(&self) -> &str {
        &self.hub_name
    }

    /// The base64 device key, if the device mints its own tokens
    pub fn shared_access_key(&self) -> Option<&str> {
        self.shared_access_key.as_deref()
    }

    /// The externally issued SAS token this endpoint was created with
    ///
    /// Renewed or replaced tokens are not written back here; read the live token from
    /// [`CredentialSet::token`](crate::CredentialSet::token).
    pub fn shared_access_token(&self) -> Option<&str> {
        self.shared_access_token.as_deref()
    }

    ///
    pub fn uses_certificate_auth(&self) -> bool {
        self.uses_certificate_auth
    }
}

impl FromStr for ConnectionEndpoint {
    type Err = AuthError;

    fn from_str(connection_string: &str) -> Result<Self, Self::Err> {
        let mut host_name = None;
        let mut device_id = None;
        let mut key = None;
        let mut signature = None;
        let mut x509 = false;

        for part in connection_string.split(';').filter(|p| !p.trim().is_empty()) {
            let (name, value) = match part.find('=') {
                Some(idx) => (part[..idx].trim(), &part[idx + 1..]),
                None => {
                    return Err(AuthError::InvalidArgument(format!(
                        "malformed connection string segment `{}`",
                        part
                    )))
                }
            };
            match name {
                HOSTNAME_KEY => host_name = Some(value.to_string()),
                DEVICEID_KEY => device_id = Some(value.to_string()),
                SHAREDACCESSKEY_KEY => key = Some(value.to_string()),
                SHAREDACCESSSIGNATURE_KEY => signature = Some(value.to_string()),
                X509_KEY => x509 = value.eq_ignore_ascii_case("true"),
                _ => (), // Ignore extraneous component in the connection string
            }
        }

        let host_name = host_name.ok_or_else(|| {
            AuthError::InvalidArgument(format!("connection string is missing {}", HOSTNAME_KEY))
        })?;
        let device_id = device_id.ok_or_else(|| {
            AuthError::InvalidArgument(format!("connection string is missing {}", DEVICEID_KEY))
        })?;

        Self::new(host_name, device_id, key, signature, x509)
    }
}

impl fmt::Debug for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEndpoint")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field("hub_name", &self.hub_name)
            .field(
                "shared_access_key",
                &self.shared_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "shared_access_token",
                &self.shared_access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("uses_certificate_auth", &self.uses_certificate_auth)
            .finish()
    }
}
