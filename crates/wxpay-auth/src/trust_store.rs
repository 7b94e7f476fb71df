//! In-memory set of trusted platform certificates keyed by serial number.
//!
//! The store only grows: `merge` adds or supersedes entries, nothing removes
//! them. A merge publishes the whole batch under one write lock, so readers
//! see either none or all of it.

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use rsa::{
    pkcs1v15::{Signature, VerifyingKey},
    signature::Verifier as _,
    RsaPublicKey,
};
use sha2::Sha256;
use x509_cert::Certificate;

use crate::error::{Result, WechatPayError};
use crate::pem::{certificate_public_key, certificate_serial_hex};

#[derive(Debug, Clone)]
/// A parsed platform certificate and the RSA key extracted from it.
pub struct TrustedCertificate {
    serial_number: String,
    certificate: Certificate,
    public_key: RsaPublicKey,
}

impl TrustedCertificate {
    pub fn from_certificate(certificate: Certificate) -> Result<Self> {
        let public_key = certificate_public_key(&certificate)?;
        Ok(Self {
            serial_number: certificate_serial_hex(&certificate),
            certificate,
            public_key,
        })
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Checks a SHA256-with-RSA signature over `message`; a mismatch is `Ok(false)`.
    pub fn verify(&self, message: &[u8], signature_b64: &str) -> Result<bool> {
        let raw = BASE64_STANDARD
            .decode(signature_b64.trim())
            .map_err(|error| WechatPayError::Verification(format!("bad signature: {error}")))?;
        let Ok(signature) = Signature::try_from(raw.as_slice()) else {
            return Ok(false);
        };
        let verifying_key = VerifyingKey::<Sha256>::new(self.public_key.clone());
        Ok(verifying_key.verify(message, &signature).is_ok())
    }
}

fn normalize_serial(serial_number: &str) -> String {
    serial_number.trim().to_ascii_uppercase()
}

#[derive(Debug, Default)]
pub struct CertificateTrustStore {
    certificates: RwLock<BTreeMap<String, TrustedCertificate>>,
}

impl CertificateTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_certificates(certificates: Vec<TrustedCertificate>) -> Self {
        let store = Self::new();
        store.merge(certificates);
        store
    }

    pub fn lookup(&self, serial_number: &str) -> Result<TrustedCertificate> {
        let certificates = self
            .certificates
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        certificates
            .get(&normalize_serial(serial_number))
            .cloned()
            .ok_or_else(|| WechatPayError::UnknownCertificate(serial_number.to_string()))
    }

    /// Adds or replaces every certificate in one atomic publish; returns how many were merged.
    pub fn merge(&self, certificates: Vec<TrustedCertificate>) -> usize {
        let merged = certificates.len();
        if merged == 0 {
            return 0;
        }
        let mut current = self
            .certificates
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for certificate in certificates {
            current.insert(certificate.serial_number.clone(), certificate);
        }
        merged
    }

    pub fn verify_signature(
        &self,
        serial_number: &str,
        message: &[u8],
        signature_b64: &str,
    ) -> Result<bool> {
        let certificate = self.lookup(serial_number)?;
        let verified = certificate.verify(message, signature_b64)?;
        if !verified {
            tracing::warn!(
                serial_no = %certificate.serial_number,
                "platform signature did not match"
            );
        }
        Ok(verified)
    }

    pub fn len(&self) -> usize {
        self.certificates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn serial_numbers(&self) -> Vec<String> {
        self.certificates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
