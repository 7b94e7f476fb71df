//! Request signing and platform trust for the WeChat Pay API v3.
//!
//! Outgoing requests are signed with the merchant RSA key
//! (`WECHATPAY2-SHA256-RSA2048`). Responses are checked against platform
//! certificates that [`AutoRefreshingVerifier`] downloads, decrypts with the
//! API v3 key and keeps fresh. Every verification path fails closed.

mod aes;
mod client;
mod credentials;
mod error;
mod pem;
mod signer;
mod trust_store;
mod validator;
mod verifier;

pub use aes::{decrypt_aes_256_gcm, encrypt_aes_256_gcm, AES_GCM_NONCE_BYTES, API_V3_KEY_BYTES};
pub use client::{
    ApiResponse, ApiV3Client, ClientConfig, ResponseValidation, DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use credentials::{
    build_message, canonical_url, format_token, WechatPay2Credentials, WECHATPAY2_SCHEMA,
};
pub use error::{ErrorKind, Result, WechatPayError};
pub use pem::{
    certificate_public_key, certificate_serial_hex, certificate_to_pem, load_private_key_file,
    load_private_key_pem, parse_certificate_pem, verify_certificate_issued_by,
};
pub use signer::{PrivateKeySigner, SignatureResult};
pub use trust_store::{CertificateTrustStore, TrustedCertificate};
pub use validator::{
    build_verification_message, ResponseSignatureHeaders, ResponseValidator,
    WECHATPAY_NONCE_HEADER, WECHATPAY_SERIAL_HEADER, WECHATPAY_SIGNATURE_HEADER,
    WECHATPAY_TIMESTAMP_HEADER,
};
pub use verifier::{
    AutoRefreshingVerifier, EncryptedCertificate, VerifierConfig, DEFAULT_CERTIFICATE_TTL_SECS,
    WECHATPAY_CERTIFICATES_URL,
};

pub use reqwest::{header::HeaderMap, Method, Url};
