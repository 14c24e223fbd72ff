use native_tls::Certificate;

use crate::TlsError;

/// A root certificate authority the hub's server certificate may chain to
///
/// The set is compiled into the crate and shared read-only by every TLS context build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustAnchor {
    name: &'static str,
    pem: &'static str,
}

const TRUSTED_IOT_HUB_ROOTS: &[TrustAnchor] = &[
    TrustAnchor {
        name: "DigiCert Global Root G2",
        pem: include_str!("../certs/DigiCert_Global_Root_G2.pem"),
    },
    TrustAnchor {
        name: "Microsoft RSA Root Certificate Authority 2017",
        pem: include_str!("../certs/Microsoft_RSA_Root_Certificate_Authority_2017.pem"),
    },
    TrustAnchor {
        name: "Microsoft ECC Root Certificate Authority 2017",
        pem: include_str!("../certs/Microsoft_ECC_Root_Certificate_Authority_2017.pem"),
    },
];

impl TrustAnchor {
    /// Every root the SDK trusts
    pub fn all() -> &'static [TrustAnchor] {
        TRUSTED_IOT_HUB_ROOTS
    }

    /// Decode the whole set, failing on the first anchor that does not parse
    pub fn certificates() -> Result<Vec<Certificate>, TlsError> {
        Self::all().iter().map(TrustAnchor::certificate).collect()
    }

    ///
    pub fn name(&self) -> &'static str {
        self.name
    }

    ///
    pub fn pem(&self) -> &'static str {
        self.pem
    }

    /// Decode this anchor for use in a TLS context
    pub fn certificate(&self) -> Result<Certificate, TlsError> {
        Certificate::from_pem(self.pem.as_bytes()).map_err(|e| TlsError::parse("trust anchor", e))
    }
}
