use rand::RngCore;

/// Random identifier of the form `<prefix>_<16 hex chars>`.
pub fn generate_id(prefix: &str) -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{prefix}_{}", hex::encode(bytes))
}
