//! Random alphanumeric nonces for request signing.

use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Nonce length used for the `nonce_str` field of signed requests.
pub const DEFAULT_NONCE_LEN: usize = 20;

const NONCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
// Largest multiple of the alphabet size that fits in a byte; higher bytes are rejected.
const NONCE_ACCEPT_BELOW: u8 = (256 / NONCE_ALPHABET.len() * NONCE_ALPHABET.len()) as u8;

#[derive(Debug, Error)]
pub enum NonceError {
    #[error("operating system random source failed: {0}")]
    Rng(#[from] rand::Error),
}

/// Returns `len` characters drawn uniformly from `[A-Za-z0-9]` using the OS RNG.
pub fn generate_nonce(len: usize) -> Result<String, NonceError> {
    let mut nonce = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while nonce.len() < len {
        OsRng.try_fill_bytes(&mut buf)?;
        for byte in buf {
            if nonce.len() == len {
                break;
            }
            if byte < NONCE_ACCEPT_BELOW {
                let index = usize::from(byte) % NONCE_ALPHABET.len();
                nonce.push(char::from(NONCE_ALPHABET[index]));
            }
        }
    }
    Ok(nonce)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{generate_nonce, DEFAULT_NONCE_LEN, NONCE_ACCEPT_BELOW};

    #[test]
    fn unit_nonce_has_requested_length_and_alphabet() {
        for len in [0, 1, DEFAULT_NONCE_LEN, 97] {
            let nonce = generate_nonce(len).expect("nonce");
            assert_eq!(nonce.len(), len);
            assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn unit_nonces_do_not_repeat() {
        let seen: HashSet<String> = (0..64)
            .map(|_| generate_nonce(DEFAULT_NONCE_LEN).expect("nonce"))
            .collect();
        assert_eq!(seen.len(), 64);
    }

    #[test]
    fn unit_rejection_bound_is_a_multiple_of_the_alphabet() {
        assert_eq!(NONCE_ACCEPT_BELOW, 248);
    }
}
