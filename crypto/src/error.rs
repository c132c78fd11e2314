use agora_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("malformed signature: expected 64 bytes, got {0}")]
    MalformedSignature(usize),

    #[error("no public key registered for node {0}")]
    UnknownKey(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::SignerUnavailable(_) => ErrorKind::Storage,
            CryptoError::MalformedSignature(_) => ErrorKind::Integrity,
            CryptoError::UnknownKey(_) => ErrorKind::NotFound,
        }
    }
}
