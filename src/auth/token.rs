use rand::RngCore;

const SECRET_BYTES: usize = 32;

/// Generates a 256-bit secret from the OS random source, hex-encoded.
/// Used for API tokens, replication bearer tokens, and invitation keys.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
