use azure_iot_device_auth::{
    AuthConfig, AuthError, AuthType, ConnectionEndpoint, CredentialSet, PemSource, SasToken,
    TlsMode,
};
use std::env;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CERT_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/device_cert.pem");
const KEY_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/device_key.pem");
const OTHER_CERT_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/other_cert.pem");
const OTHER_KEY_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/other_key.pem");

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config() -> (String, String, String) {
    (
        env::var("IOTHUB_HOSTNAME").unwrap_or_else(|_| "myhub.azure-devices.net".to_string()),
        env::var("IOT_DEVICE_ID").unwrap_or_else(|_| "dev1".to_string()),
        env::var("IOT_DEVICE_ACCESS_KEY").unwrap_or_else(|_| "base64key==".to_string()),
    )
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[test]
fn sas_device_end_to_end() {
    init_logging();
    let (hostname, device_id, access_key) = test_config();
    let endpoint = ConnectionEndpoint::with_shared_key(
        hostname.as_str(),
        device_id.as_str(),
        access_key.as_str(),
    )
    .unwrap();

    let credentials = CredentialSet::from_sas(endpoint, AuthConfig::default()).unwrap();

    assert_eq!(credentials.auth_type(), AuthType::SasToken);
    assert_eq!(credentials.hub_name(), hostname.split('.').next().unwrap());
    assert_eq!(credentials.tls_context().mode(), TlsMode::ServerAuthOnly);
    assert!(!credentials.needs_renewal());

    let token = credentials.token().unwrap();
    assert!(token.starts_with("SharedAccessSignature "));
    assert!(token.contains("sr="));
    assert!(token.contains("sig="));
    assert!(token.contains("se="));

    let parsed: SasToken = token.parse().unwrap();
    let validity = 3600;
    assert!(parsed.expiry() >= now() + validity - 2);
    assert!(parsed.expiry() <= now() + validity + 2);
}

#[test]
fn short_lived_tokens_renew_on_read() {
    init_logging();
    let endpoint: ConnectionEndpoint =
        "HostName=myhub.azure-devices.net;DeviceId=dev1;SharedAccessKey=O+H9VTcdJP0Tqkl7bh4nVG0OJNrAataMpuWB54D0VEc="
            .parse()
            .unwrap();
    let config = AuthConfig::default().with_token_validity(Duration::from_secs(0));
    let credentials = CredentialSet::from_sas(endpoint, config).unwrap();

    let first = credentials.token().unwrap();
    let second = credentials.token().unwrap();

    // The initial zero-validity token was stale; the renewal carries the one second skew
    let first: SasToken = first.parse().unwrap();
    let second: SasToken = second.parse().unwrap();
    assert!(second.expiry() >= first.expiry());
    assert!(!credentials.needs_renewal());
}

#[test]
fn hub_issued_token_gets_stuck_once_expired() {
    init_logging();
    let stale = "SharedAccessSignature sr=myhub.azure-devices.net%2Fdevices%2Fdev1&sig=c2lnbmF0dXJl&se=1587123309";
    let connection_string = format!(
        "HostName=myhub.azure-devices.net;DeviceId=dev1;SharedAccessSignature={}",
        stale
    );
    let endpoint: ConnectionEndpoint = connection_string.parse().unwrap();
    let credentials = CredentialSet::from_sas(endpoint, AuthConfig::default()).unwrap();

    assert!(credentials.needs_renewal());
    assert_eq!(credentials.token().as_deref(), Some(stale));
    assert_eq!(credentials.shared_key(), None);
}

#[test]
fn x509_device_end_to_end() {
    init_logging();
    let endpoint: ConnectionEndpoint = "HostName=myhub.azure-devices.net;DeviceId=dev1;x509=true"
        .parse()
        .unwrap();

    let mut credentials = CredentialSet::from_x509(
        endpoint,
        PemSource::path(CERT_PATH),
        PemSource::path(KEY_PATH),
        AuthConfig::default(),
    )
    .unwrap();

    assert_eq!(credentials.auth_type(), AuthType::X509Certificate);
    assert_eq!(credentials.token(), None);
    assert_eq!(credentials.shared_key(), None);
    assert!(!credentials.needs_renewal());
    assert_eq!(credentials.tls_context().mode(), TlsMode::Mutual);

    let certificate = credentials.certificate().unwrap();
    assert_eq!(
        certificate.public_certificate(),
        fs::read_to_string(CERT_PATH).unwrap()
    );
    assert_eq!(certificate.private_key(), fs::read_to_string(KEY_PATH).unwrap());

    credentials
        .replace_certificate(PemSource::path(OTHER_CERT_PATH), PemSource::path(OTHER_KEY_PATH))
        .unwrap();
    assert_eq!(
        credentials
            .certificate()
            .unwrap()
            .public_certificate_path()
            .unwrap()
            .to_str(),
        Some(OTHER_CERT_PATH)
    );

    let missing = credentials.replace_certificate(
        PemSource::path("/nonexistent/cert.pem"),
        PemSource::path(KEY_PATH),
    );
    assert!(matches!(missing, Err(AuthError::Io { .. })));
    assert_eq!(
        credentials.certificate().unwrap().public_certificate(),
        fs::read_to_string(OTHER_CERT_PATH).unwrap()
    );
}

#[test]
fn constructors_enforce_mode_exclusivity() {
    init_logging();
    let sas_endpoint =
        ConnectionEndpoint::with_shared_key("myhub.azure-devices.net", "dev1", "base64key==")
            .unwrap();
    let x509_endpoint =
        ConnectionEndpoint::with_certificate("myhub.azure-devices.net", "dev1").unwrap();

    let wrong_sas = CredentialSet::from_sas(x509_endpoint, AuthConfig::default());
    assert!(matches!(wrong_sas, Err(AuthError::InvalidArgument(_))));

    let wrong_x509 = CredentialSet::from_x509(
        sas_endpoint,
        PemSource::path(CERT_PATH),
        PemSource::path(KEY_PATH),
        AuthConfig::default(),
    );
    assert!(matches!(wrong_x509, Err(AuthError::InvalidArgument(_))));
}

#[test]
fn credentials_are_shareable_across_threads() {
    init_logging();
    let endpoint =
        ConnectionEndpoint::with_shared_key("myhub.azure-devices.net", "dev1", "base64key==")
            .unwrap();
    let credentials = Arc::new(CredentialSet::from_sas(endpoint, AuthConfig::default()).unwrap());
    let expected = credentials.token().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let credentials = Arc::clone(&credentials);
            thread::spawn(move || credentials.token().unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[cfg(feature = "mqtt-transport")]
#[test]
fn transport_receives_fresh_token() {
    use azure_iot_device_auth::MqttConnectOptions;

    init_logging();
    let endpoint =
        ConnectionEndpoint::with_shared_key("myhub.azure-devices.net", "dev1", "base64key==")
            .unwrap();
    let credentials = CredentialSet::from_sas(endpoint, AuthConfig::default()).unwrap();

    let options = MqttConnectOptions::from_credentials(&credentials).unwrap();
    assert_eq!(options.password(), credentials.token().as_deref());
    let _connector = options.tls_context().async_connector();
}
