//! Error types for receipt signing and verification.

use core::fmt;

/// Error types for receipt signing, verification and the collaborators
/// wired around them.
///
/// A signature that recovers to a different address than the one claimed is
/// not an error; it is reported through
/// [`VerificationResult::valid`](crate::VerificationResult).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No key source produced a private key
    MissingPrivateKey,
    /// The provided private key is invalid
    InvalidPrivateKey(String),
    /// The provided address is not 20 hex-encoded bytes
    InvalidAddress(String),
    /// The receipt does not have the expected shape
    MalformedReceipt(String),
    /// The signature cannot be decoded or no key can be recovered from it
    InvalidSignature(String),
    /// The payment collaborator failed to submit the transfer
    Payment(String),
    /// Reading or writing a file failed
    Io(String),
    /// The configuration could not be loaded
    Config(String),
    /// A value could not be serialized
    Serialization(String),
}

impl Error {
    /// Missing or unusable signing capability.
    pub fn is_identity_error(&self) -> bool {
        matches!(self, Self::MissingPrivateKey | Self::InvalidPrivateKey(_))
    }

    /// Verification input that could not be checked at all.
    pub fn is_malformed_receipt(&self) -> bool {
        matches!(self, Self::MalformedReceipt(_) | Self::InvalidSignature(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingPrivateKey => write!(f, "No private key supplied"),
            Self::InvalidPrivateKey(e) => write!(f, "Invalid private key - {}", e),
            Self::InvalidAddress(e) => write!(f, "Invalid address - {}", e),
            Self::MalformedReceipt(e) => write!(f, "Malformed receipt - {}", e),
            Self::InvalidSignature(e) => write!(f, "Invalid Signature - {}", e),
            Self::Payment(e) => write!(f, "Payment failed - {}", e),
            Self::Io(e) => write!(f, "I/O error - {}", e),
            Self::Config(e) => write!(f, "Configuration error - {}", e),
            Self::Serialization(e) => write!(f, "Serialization error - {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
