//! Signing secret strength checks
//!
//! The HS256 secret is process-wide, so a guessable value compromises every tenant.
//! Startup classifies `JWT_SECRET_KEY` and refuses to run with a weak one.

const MIN_SECRET_LENGTH: usize = 32; // 256 bits, the HS256 output size
const RECOMMENDED_SECRET_LENGTH: usize = 64;
const MIN_ENTROPY_BITS_PER_BYTE: f64 = 4.0;
const STRONG_ENTROPY_BITS_PER_BYTE: f64 = 5.0;
const MAX_RUN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStrength {
    /// Reject at startup
    Weak,
    /// Run, but warn
    Acceptable,
    Strong,
}

impl SecretStrength {
    pub fn is_usable(self) -> bool {
        self != SecretStrength::Weak
    }
}

/// Classify an HS256 signing secret.
///
/// Weak when shorter than 32 bytes, below 4 bits/byte of Shannon entropy,
/// or containing a run of 4 repeated or ascending bytes.
pub fn validate_secret_strength(secret: &str) -> SecretStrength {
    let bytes = secret.as_bytes();

    if bytes.len() < MIN_SECRET_LENGTH {
        return SecretStrength::Weak;
    }

    let entropy = shannon_entropy(bytes);
    if entropy < MIN_ENTROPY_BITS_PER_BYTE || has_runs(bytes) {
        return SecretStrength::Weak;
    }

    if bytes.len() >= RECOMMENDED_SECRET_LENGTH && entropy >= STRONG_ENTROPY_BITS_PER_BYTE {
        SecretStrength::Strong
    } else {
        SecretStrength::Acceptable
    }
}

/// Bits per byte, 0 to 8
fn shannon_entropy(data: &[u8]) -> f64 {
    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }

    let len = data.len() as f64;
    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Detect "aaaa" or "1234" style runs.
fn has_runs(data: &[u8]) -> bool {
    let mut same = 1;
    let mut ascending = 1;

    for pair in data.windows(2) {
        same = if pair[0] == pair[1] { same + 1 } else { 1 };
        ascending = if pair[1] as i16 - pair[0] as i16 == 1 {
            ascending + 1
        } else {
            1
        };
        if same >= MAX_RUN || ascending >= MAX_RUN {
            return true;
        }
    }

    false
}
