use std::error::Error as StdError;

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised by the device authentication layer
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// A descriptor was handed to the wrong constructor or could not be parsed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Certificate, key or device key material is empty or unusable
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    /// Reading credential material or assembling a TLS context failed
    #[error("{context}")]
    Io {
        /// What was being attempted
        context: String,
        /// The underlying cause
        #[source]
        source: BoxError,
    },
    /// The operation does not apply to the active authentication mode
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// The SAS token has expired and there is no device key to mint another
    #[error("credentials expired and cannot be renewed without a device key")]
    CredentialsExpired,
}

impl AuthError {
    pub(crate) fn io<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        AuthError::Io {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Errors raised while building a TLS context
#[derive(Debug, Error)]
pub enum TlsError {
    /// PEM input could not be decoded into a certificate or key
    #[error("failed to parse {what}")]
    CertificateParse {
        /// The piece of material that was rejected
        what: &'static str,
        /// The decoder's error
        #[source]
        source: BoxError,
    },
    /// The platform TLS implementation refused to build a context
    #[error("platform crypto provider unavailable")]
    PlatformCryptoUnavailable(#[source] native_tls::Error),
}

impl TlsError {
    pub(crate) fn parse<E>(what: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        TlsError::CertificateParse {
            what,
            source: source.into(),
        }
    }
}

impl From<native_tls::Error> for TlsError {
    fn from(err: native_tls::Error) -> Self {
        TlsError::PlatformCryptoUnavailable(err)
    }
}

impl From<TlsError> for AuthError {
    fn from(err: TlsError) -> Self {
        AuthError::io("failed to build TLS context", err)
    }
}
