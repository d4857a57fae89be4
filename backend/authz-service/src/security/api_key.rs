use rand::RngCore;

const API_KEY_BYTES: usize = 32;

/// Random application API key: 32 bytes from the OS RNG, hex encoded.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }

    diff == 0
}
