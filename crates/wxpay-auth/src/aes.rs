//! AES-256-GCM decryption of API v3 encrypted resources.
//!
//! WeChat Pay encrypts downloaded platform certificates (and callback
//! resources) with the merchant's 32-byte API v3 key. The ciphertext field is
//! base64 of `ciphertext || tag`; the nonce and associated data travel as plain
//! strings next to it.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};

use crate::error::{Result, WechatPayError};

pub const API_V3_KEY_BYTES: usize = 32;
pub const AES_GCM_NONCE_BYTES: usize = 12;

fn build_cipher(key: &[u8], nonce: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != API_V3_KEY_BYTES {
        return Err(WechatPayError::InvalidKeyLength(key.len()));
    }
    if nonce.len() != AES_GCM_NONCE_BYTES {
        return Err(WechatPayError::InvalidNonceLength(nonce.len()));
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| WechatPayError::InvalidKeyLength(key.len()))
}

/// Decrypts a base64 `ciphertext || tag` payload into UTF-8 plaintext.
pub fn decrypt_aes_256_gcm(
    associated_data: &[u8],
    nonce: &[u8],
    ciphertext_b64: &str,
    key: &[u8],
) -> Result<String> {
    let cipher = build_cipher(key, nonce)?;
    let ciphertext = BASE64_STANDARD
        .decode(ciphertext_b64.trim())
        .map_err(|error| WechatPayError::Decode(format!("ciphertext is not base64: {error}")))?;
    let plaintext = cipher
        .decrypt(
            nonce.into(),
            Payload {
                msg: &ciphertext,
                aad: associated_data,
            },
        )
        .map_err(|_| WechatPayError::AuthenticationFailure)?;
    String::from_utf8(plaintext)
        .map_err(|_| WechatPayError::Decode("plaintext is not valid UTF-8".to_string()))
}

/// Produces the same envelope the platform sends; used by tooling and tests.
pub fn encrypt_aes_256_gcm(
    associated_data: &[u8],
    nonce: &[u8],
    plaintext: &str,
    key: &[u8],
) -> Result<String> {
    let cipher = build_cipher(key, nonce)?;
    let ciphertext = cipher
        .encrypt(
            nonce.into(),
            Payload {
                msg: plaintext.as_bytes(),
                aad: associated_data,
            },
        )
        .map_err(|_| WechatPayError::Encryption("AES-GCM encryption failed".to_string()))?;
    Ok(BASE64_STANDARD.encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;

    use super::{decrypt_aes_256_gcm, encrypt_aes_256_gcm, BASE64_STANDARD};
    use crate::error::{ErrorKind, WechatPayError};

    const KEY: &[u8; 32] = b"AES256Key-32Characters1234567890";
    const NONCE: &[u8; 12] = b"0123456789ab";

    fn sealed(plaintext: &str) -> String {
        encrypt_aes_256_gcm(b"certificate", NONCE, plaintext, KEY).expect("encrypt")
    }

    #[test]
    fn functional_decrypts_platform_envelope() {
        let ciphertext = sealed("-----BEGIN CERTIFICATE-----");
        let plaintext =
            decrypt_aes_256_gcm(b"certificate", NONCE, &ciphertext, KEY).expect("decrypt");
        assert_eq!(plaintext, "-----BEGIN CERTIFICATE-----");
    }

    #[test]
    fn unit_wrong_key_length_fails_before_decoding() {
        for len in [0usize, 16, 31, 33] {
            let key = vec![7u8; len];
            let error = decrypt_aes_256_gcm(b"certificate", NONCE, "%%% not base64 %%%", &key)
                .expect_err("short key must fail");
            assert!(matches!(error, WechatPayError::InvalidKeyLength(l) if l == len));
            assert_eq!(error.kind(), ErrorKind::Config);
        }
    }

    #[test]
    fn unit_wrong_nonce_length_is_rejected() {
        let error = decrypt_aes_256_gcm(b"certificate", b"short", &sealed("x"), KEY)
            .expect_err("short nonce");
        assert!(matches!(error, WechatPayError::InvalidNonceLength(5)));
    }

    #[test]
    fn unit_invalid_base64_is_a_decode_error() {
        let error = decrypt_aes_256_gcm(b"certificate", NONCE, "!!!", KEY).expect_err("bad b64");
        assert!(matches!(error, WechatPayError::Decode(_)));
    }

    #[test]
    fn regression_mismatched_inputs_fail_authentication() {
        let ciphertext = sealed("secret certificate");

        let wrong_aad = decrypt_aes_256_gcm(b"transaction", NONCE, &ciphertext, KEY);
        assert!(matches!(wrong_aad, Err(WechatPayError::AuthenticationFailure)));

        let wrong_nonce = decrypt_aes_256_gcm(b"certificate", b"ba9876543210", &ciphertext, KEY);
        assert!(matches!(wrong_nonce, Err(WechatPayError::AuthenticationFailure)));

        let wrong_key = decrypt_aes_256_gcm(
            b"certificate",
            NONCE,
            &ciphertext,
            b"00000000000000000000000000000000",
        );
        assert!(matches!(wrong_key, Err(WechatPayError::AuthenticationFailure)));

        let mut raw = BASE64_STANDARD.decode(&ciphertext).expect("base64");
        raw[0] ^= 0x01;
        let tampered = BASE64_STANDARD.encode(raw);
        let tampered = decrypt_aes_256_gcm(b"certificate", NONCE, &tampered, KEY);
        assert!(matches!(tampered, Err(WechatPayError::AuthenticationFailure)));
    }
}
