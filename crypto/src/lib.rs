//! Cryptographic primitives for the Agora marketplace.
//!
//! - **Ed25519** for signing and signature verification
//! - **Blake2b** for hashing (ledger entry hashes, committee selection)
//! - The identity contract consumed by the ledger: [`Signer`] and [`SignatureVerifier`]

pub mod error;
pub mod hash;
pub mod id;
pub mod identity;
pub mod keys;
pub mod sign;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_hex, blake2b_256_multi};
pub use id::generate_id;
pub use identity::{KeyPairSigner, PublicKeyRegistry, SignatureVerifier, Signer};
pub use keys::{derive_node_id, generate_keypair, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
