//! SHA256-with-RSA request signing.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use rsa::{
    pkcs1v15::SigningKey,
    signature::{SignatureEncoding, Signer as _},
    RsaPrivateKey,
};
use sha2::Sha256;

use crate::error::{Result, WechatPayError};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Base64 signature plus the serial of the certificate whose key produced it.
pub struct SignatureResult {
    pub signature: String,
    pub certificate_serial_number: String,
}

/// Signs messages with the merchant RSA key (PKCS#1 v1.5, SHA-256).
#[derive(Clone)]
pub struct PrivateKeySigner {
    certificate_serial_number: String,
    signing_key: SigningKey<Sha256>,
}

impl PrivateKeySigner {
    pub fn new(certificate_serial_number: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            certificate_serial_number: certificate_serial_number.into(),
            signing_key: SigningKey::<Sha256>::new(private_key),
        }
    }

    pub fn certificate_serial_number(&self) -> &str {
        &self.certificate_serial_number
    }

    pub fn sign(&self, message: &[u8]) -> Result<SignatureResult> {
        let signature = self
            .signing_key
            .try_sign(message)
            .map_err(|error| WechatPayError::Signing(error.to_string()))?;

        Ok(SignatureResult {
            signature: BASE64_STANDARD.encode(signature.to_bytes()),
            certificate_serial_number: self.certificate_serial_number.clone(),
        })
    }
}

impl fmt::Debug for PrivateKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeySigner")
            .field("certificate_serial_number", &self.certificate_serial_number)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}
