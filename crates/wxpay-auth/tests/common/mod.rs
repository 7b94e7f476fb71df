#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use rsa::{pkcs1v15::SigningKey, signature::SignatureEncoding, signature::Signer as _};
use serde_json::json;
use sha2::Sha256;
use wxpay_auth::{
    build_verification_message, encrypt_aes_256_gcm, load_private_key_pem, PrivateKeySigner,
    WechatPay2Credentials,
};

pub const API_V3_KEY: &[u8; 32] = b"wxpayIntegrationApiV3Key-0123456";
pub const MERCHANT_ID: &str = "1900000001";
pub const MERCHANT_SERIAL: &str = "1DB2A1F3E6E3F2A8B77C0F3C2D4E5F60718293A4";

pub const MERCHANT_KEY_PEM: &str = include_str!("../fixtures/merchant_key.pem");
pub const PLATFORM_KEY_PEM: &str = include_str!("../fixtures/platform_key.pem");
pub const PLATFORM_CERT_PEM: &str = include_str!("../fixtures/platform_cert.pem");
pub const PLATFORM_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";
pub const PLATFORM2_KEY_PEM: &str = include_str!("../fixtures/platform2_key.pem");
pub const PLATFORM2_CERT_PEM: &str = include_str!("../fixtures/platform2_cert.pem");
pub const PLATFORM2_SERIAL: &str = "0A3C58C6F4B2D1E09A7B6C5D4E3F201918273645";

pub fn merchant_credentials() -> WechatPay2Credentials {
    let key = load_private_key_pem(MERCHANT_KEY_PEM).expect("merchant key fixture");
    WechatPay2Credentials::new(MERCHANT_ID, PrivateKeySigner::new(MERCHANT_SERIAL, key))
}

pub fn merchant_public_key() -> rsa::RsaPublicKey {
    let key = load_private_key_pem(MERCHANT_KEY_PEM).expect("merchant key fixture");
    rsa::RsaPublicKey::from(key)
}

pub fn sign_with(key_pem: &str, message: &[u8]) -> String {
    let key = load_private_key_pem(key_pem).expect("signing key fixture");
    let signature = SigningKey::<Sha256>::new(key).sign(message);
    BASE64_STANDARD.encode(signature.to_bytes())
}

/// Trust headers a platform key would attach to `body`.
pub fn signed_headers(key_pem: &str, serial: &str, body: &str) -> Vec<(&'static str, String)> {
    let timestamp = "1700000000";
    let nonce = "ResponseNonce0001";
    let message = build_verification_message(timestamp, nonce, body);
    vec![
        ("Wechatpay-Serial", serial.to_string()),
        ("Wechatpay-Signature", sign_with(key_pem, message.as_bytes())),
        ("Wechatpay-Timestamp", timestamp.to_string()),
        ("Wechatpay-Nonce", nonce.to_string()),
    ]
}

/// A `/v3/certificates` body whose entries are sealed with `key`.
pub fn certificate_bundle(entries: &[(&str, &str)], key: &[u8]) -> String {
    let data: Vec<_> = entries
        .iter()
        .enumerate()
        .map(|(index, (serial, pem))| {
            let nonce = format!("nonce{index:07}");
            json!({
                "serial_no": serial,
                "effective_time": "2024-01-01T00:00:00+08:00",
                "expire_time": "2029-01-01T00:00:00+08:00",
                "encrypt_certificate": {
                    "algorithm": "AEAD_AES_256_GCM",
                    "associated_data": "certificate",
                    "nonce": nonce,
                    "ciphertext": encrypt_aes_256_gcm(
                        b"certificate",
                        nonce.as_bytes(),
                        pem,
                        key,
                    )
                    .expect("seal certificate"),
                }
            })
        })
        .collect();
    json!({ "data": data }).to_string()
}
