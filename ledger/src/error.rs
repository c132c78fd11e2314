use agora_crypto::CryptoError;
use agora_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger entry {0} not found")]
    EntryNotFound(String),

    #[error("signer {signer} cannot author entries for {author}")]
    SignerMismatch { signer: String, author: String },

    #[error("signing failed: {0}")]
    Signing(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid ledger snapshot: {0}")]
    InvalidSnapshot(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::EntryNotFound(_) => ErrorKind::NotFound,
            LedgerError::SignerMismatch { .. } => ErrorKind::Unauthorized,
            LedgerError::Signing(_) => ErrorKind::Integrity,
            LedgerError::Serialization(_) | LedgerError::InvalidSnapshot(_) => ErrorKind::Storage,
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}
