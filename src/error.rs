use std::io;
use std::sync::Arc;

use nom::error::ErrorKind;
use thiserror::Error;

use crate::message::{Alert, AlertDescription};

/// Errors surfaced by the engine and the connection driver.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Parse error: {0:?}")]
    ParseError(ErrorKind),

    #[error("Parse incomplete")]
    ParseIncomplete,

    #[error("Record length {declared} does not match payload length {actual}")]
    RecordLengthMismatch { declared: usize, actual: usize },

    #[error("Unsupported protocol version")]
    UnsupportedProtocolVersion,

    #[error("No cipher suite in common")]
    CipherSuiteNoIntersection,

    #[error("No supported elliptic curves in common")]
    NoSupportedEllipticCurves,

    #[error("No SRTP protection profile in common")]
    ServerNoMatchingSrtpProfile,

    #[error("Extended master secret required but not offered by client")]
    ServerRequiredButNoClientEms,

    #[error("Extended master secret required but not accepted by server")]
    ClientRequiredButNoServerEms,

    #[error("No signature algorithm in common")]
    SignatureAlgorithmNoIntersection,

    #[error("Cookie does not match")]
    CookieMismatch,

    #[error("Certificate rejected: {0}")]
    CertificateRejected(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Finished verify data does not match")]
    VerifyDataMismatch,

    #[error("Client certificate required")]
    ClientCertificateRequired,

    #[error("Fragment declares a different total length for the same message")]
    FragmentLengthMismatch,

    #[error("Too many incomplete handshake messages buffered")]
    FragmentBufferFull,

    #[error("Transmit queue full")]
    TransmitQueueFull,

    #[error("Record failed authentication")]
    BadRecordMac,

    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Random source failure: {0}")]
    RandomError(String),

    #[error("Received alert: {0}")]
    Alert(Alert),

    #[error("Sent alert: {0:?}")]
    AlertSent(AlertDescription),

    #[error("Timeout: {0}")]
    Timeout(&'static str),

    #[error("Handshake in progress")]
    HandshakeInProgress,

    #[error("Application data of {0} bytes does not fit in one record")]
    DataTooLarge(usize),

    #[error("Buffer too small")]
    BufferTooSmall,

    #[error("Connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl Error {
    /// The alert to send to the peer when this error aborts a handshake.
    pub(crate) fn alert_description(&self) -> AlertDescription {
        match self {
            Error::ParseError(_)
            | Error::ParseIncomplete
            | Error::RecordLengthMismatch { .. }
            | Error::FragmentLengthMismatch => AlertDescription::DecodeError,
            Error::UnsupportedProtocolVersion => AlertDescription::ProtocolVersion,
            Error::CipherSuiteNoIntersection
            | Error::NoSupportedEllipticCurves
            | Error::ServerNoMatchingSrtpProfile
            | Error::SignatureAlgorithmNoIntersection
            | Error::ServerRequiredButNoClientEms
            | Error::ClientRequiredButNoServerEms => AlertDescription::InsufficientSecurity,
            Error::CookieMismatch => AlertDescription::AccessDenied,
            Error::CertificateRejected(_) => AlertDescription::BadCertificate,
            Error::InvalidSignature | Error::VerifyDataMismatch => AlertDescription::DecryptError,
            Error::BadRecordMac => AlertDescription::BadRecordMac,
            Error::ClientCertificateRequired => AlertDescription::HandshakeFailure,
            Error::AlertSent(d) => *d,
            _ => AlertDescription::InternalError,
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(x) | nom::Err::Failure(x) => Error::ParseError(x.code),
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(Arc::new(value))
    }
}
