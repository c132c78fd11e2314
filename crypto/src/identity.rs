//! The signing contract consumed by the ledger and other components.
//!
//! Key management lives outside the core. Components only see a [`Signer`]
//! that produces opaque signature bytes and a [`SignatureVerifier`] keyed by
//! node id. [`KeyPairSigner`] and [`PublicKeyRegistry`] are the Ed25519
//! implementations used by a running node.

use std::collections::HashMap;
use std::sync::RwLock;

use agora_types::{KeyPair, NodeId, PublicKey, Signature};

use crate::error::CryptoError;
use crate::keys::derive_node_id;
use crate::sign::{sign_message, verify_signature};

/// Produces signatures on behalf of the local node.
pub trait Signer: Send + Sync {
    /// The node whose key this signer holds.
    fn node_id(&self) -> NodeId;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Checks signatures produced by any node.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, node_id: &NodeId, message: &[u8], signature: &[u8]) -> bool;
}

/// Ed25519 signer over an owned key pair.
pub struct KeyPairSigner {
    keypair: KeyPair,
    node_id: NodeId,
}

impl KeyPairSigner {
    pub fn new(keypair: KeyPair) -> Self {
        let node_id = derive_node_id(&keypair.public);
        Self { keypair, node_id }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }
}

impl Signer for KeyPairSigner {
    fn node_id(&self) -> NodeId {
        self.node_id.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(sign_message(message, &self.keypair.private).0.to_vec())
    }
}

/// Known public keys by node id.
///
/// Ids not registered explicitly fall back to decoding the id itself as a
/// hex public key, which holds for every id produced by `derive_node_id`.
#[derive(Default)]
pub struct PublicKeyRegistry {
    keys: RwLock<HashMap<NodeId, PublicKey>>,
}

impl PublicKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node_id: NodeId, key: PublicKey) {
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(node_id, key);
    }

    pub fn lookup(&self, node_id: &NodeId) -> Result<PublicKey, CryptoError> {
        if let Some(key) = self
            .keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(node_id)
        {
            return Ok(key.clone());
        }
        PublicKey::from_hex(node_id.as_str())
            .ok_or_else(|| CryptoError::UnknownKey(node_id.to_string()))
    }
}

impl SignatureVerifier for PublicKeyRegistry {
    fn verify(&self, node_id: &NodeId, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = self.lookup(node_id) else {
            return false;
        };
        let Some(sig) = Signature::from_slice(signature) else {
            return false;
        };
        verify_signature(message, &sig, &key)
    }
}
