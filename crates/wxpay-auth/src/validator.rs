//! Response signature validation.
//!
//! WeChat Pay signs every response body with a platform certificate and
//! reports the serial, signature, timestamp and nonce in headers. The signed
//! message is `timestamp\nnonce\nbody`.

use std::sync::Arc;

use reqwest::header::HeaderMap;

use crate::error::{Result, WechatPayError};
use crate::trust_store::CertificateTrustStore;

pub const WECHATPAY_SERIAL_HEADER: &str = "Wechatpay-Serial";
pub const WECHATPAY_SIGNATURE_HEADER: &str = "Wechatpay-Signature";
pub const WECHATPAY_TIMESTAMP_HEADER: &str = "Wechatpay-Timestamp";
pub const WECHATPAY_NONCE_HEADER: &str = "Wechatpay-Nonce";

pub fn build_verification_message(timestamp: &str, nonce: &str, body: &str) -> String {
    format!("{timestamp}\n{nonce}\n{body}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The four trust headers of a platform response.
pub struct ResponseSignatureHeaders {
    pub serial: String,
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
}

impl ResponseSignatureHeaders {
    /// Reads all four headers; absent, empty or non-ASCII values are reported together.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let mut missing = Vec::new();
        let mut read = |name: &'static str| -> String {
            let value = headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .unwrap_or_default();
            if value.is_empty() {
                missing.push(name);
            }
            value.to_string()
        };
        let serial = read(WECHATPAY_SERIAL_HEADER);
        let signature = read(WECHATPAY_SIGNATURE_HEADER);
        let timestamp = read(WECHATPAY_TIMESTAMP_HEADER);
        let nonce = read(WECHATPAY_NONCE_HEADER);
        if !missing.is_empty() {
            return Err(WechatPayError::MissingHeaders(missing));
        }
        Ok(Self {
            serial,
            signature,
            timestamp,
            nonce,
        })
    }

    pub fn message(&self, body: &str) -> String {
        build_verification_message(&self.timestamp, &self.nonce, body)
    }
}

#[derive(Debug, Clone)]
pub enum ResponseValidator {
    /// Accepts every response; only for the trust-bootstrap certificate download.
    Noop,
    /// Verifies against the given platform certificates.
    Platform(Arc<CertificateTrustStore>),
}

impl ResponseValidator {
    pub fn validate(&self, headers: &HeaderMap, body: &str) -> Result<bool> {
        match self {
            Self::Noop => Ok(true),
            Self::Platform(store) => {
                let signed = ResponseSignatureHeaders::from_headers(headers)?;
                store.verify_signature(
                    &signed.serial,
                    signed.message(body).as_bytes(),
                    &signed.signature,
                )
            }
        }
    }
}
