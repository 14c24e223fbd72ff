use mqtt::packet::ConnectPacket;

use crate::{AuthError, CredentialSet, TlsContext};

const MQTT_PORT: u16 = 8883;
const MQTT_WEBSOCKET_PORT: u16 = 443;
const KEEP_ALIVE: u16 = 10;
const API_VERSION: &str = "2018-06-30";

fn user_name(host_name: &str, device_id: &str) -> String {
    format!("{}/{}/?api-version={}", host_name, device_id, API_VERSION)
}

/// What an MQTT transport needs to open an authenticated session for one device
///
/// Assembled fresh for every connection attempt so that an expired SAS token is renewed
/// before it is handed to the broker.
#[derive(Debug, Clone)]
pub struct MqttConnectOptions {
    host_name: String,
    port: u16,
    client_id: String,
    user_name: String,
    password: Option<String>,
    keep_alive: u16,
    tls: TlsContext,
}

impl MqttConnectOptions {
    /// Collect connection options from `credentials`
    ///
    /// Fails with [`AuthError::CredentialsExpired`] when the SAS token has expired and
    /// cannot be renewed, rather than letting the broker reject the connection.
    pub fn from_credentials(credentials: &CredentialSet) -> crate::Result<Self> {
        if credentials.needs_renewal() {
            return Err(AuthError::CredentialsExpired);
        }

        let port = if credentials.config().use_websocket {
            MQTT_WEBSOCKET_PORT
        } else {
            MQTT_PORT
        };

        trace!(
            "Preparing MQTT connection to {}:{} for {}",
            credentials.host_name(),
            port,
            credentials.device_id()
        );

        Ok(Self {
            host_name: credentials.host_name().to_string(),
            port,
            client_id: credentials.device_id().to_string(),
            user_name: user_name(credentials.host_name(), credentials.device_id()),
            password: credentials.token(),
            keep_alive: KEEP_ALIVE,
            tls: credentials.tls_context().clone(),
        })
    }

    ///
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    ///
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The MQTT client identifier, which the hub requires to be the device id
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    ///
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// The SAS token, or `None` when the device authenticates with its certificate
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Keep-alive interval in seconds
    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    /// The TLS context to wrap the socket in
    pub fn tls_context(&self) -> &TlsContext {
        &self.tls
    }

    /// The CONNECT packet carrying these credentials
    pub fn connect_packet(&self) -> ConnectPacket {
        let mut conn = ConnectPacket::new(self.client_id.as_str());
        conn.set_client_identifier(self.client_id.as_str());
        conn.set_clean_session(false);
        conn.set_keep_alive(self.keep_alive);
        conn.set_user_name(Some(self.user_name.clone()));
        conn.set_password(self.password.clone());
        conn
    }
}
