//! Nullable signing: keyless, deterministic signatures for testing.
//!
//! A "signature" is `blake2b(node_id || message)`. `NullVerifier` recomputes
//! it, so any tampering with the signed message or the claimed signer is
//! still detected without generating keys.

use agora_crypto::{blake2b_256_multi, CryptoError, SignatureVerifier, Signer};
use agora_types::NodeId;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct NullSigner {
    node_id: NodeId,
    fail: AtomicBool,
}

impl NullSigner {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            fail: AtomicBool::new(false),
        }
    }

    /// Make `sign` return an error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Signer for NullSigner {
    fn node_id(&self) -> NodeId {
        self.node_id.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CryptoError::SignerUnavailable("null signer disabled".into()));
        }
        Ok(blake2b_256_multi(&[self.node_id.as_bytes(), message]).to_vec())
    }
}

/// Accepts exactly the signatures a [`NullSigner`] for the same node would produce.
#[derive(Default)]
pub struct NullVerifier;

impl SignatureVerifier for NullVerifier {
    fn verify(&self, node_id: &NodeId, message: &[u8], signature: &[u8]) -> bool {
        blake2b_256_multi(&[node_id.as_bytes(), message]).as_slice() == signature
    }
}
