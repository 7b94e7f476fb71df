//! PEM decoding for merchant keys and platform certificates.
//!
//! Merchant keys are accepted as PKCS#8 (`BEGIN PRIVATE KEY`, what the
//! merchant portal issues) or PKCS#1 (`BEGIN RSA PRIVATE KEY`). Certificates
//! are single X.509 PEM blocks.

use std::path::Path;

use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15::{Signature, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    signature::Verifier as _,
    RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use x509_cert::{
    der::{pem::LineEnding, Decode, DecodePem, Encode, EncodePem},
    ext::pkix::{BasicConstraints, KeyUsage, KeyUsages},
    spki::ObjectIdentifier,
    Certificate, Version,
};

use crate::error::{Result, WechatPayError};

const SHA256_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
const KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");

pub fn load_private_key_pem(pem: &str) -> Result<RsaPrivateKey> {
    let pem = pem.trim();
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        return RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|error| WechatPayError::InvalidPrivateKey(error.to_string()));
    }
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|error| WechatPayError::InvalidPrivateKey(error.to_string()))
}

pub fn load_private_key_file(path: &Path) -> Result<RsaPrivateKey> {
    let raw = std::fs::read_to_string(path).map_err(|error| {
        WechatPayError::InvalidPrivateKey(format!("failed to read {}: {error}", path.display()))
    })?;
    load_private_key_pem(&raw)
}

pub fn parse_certificate_pem(pem: &str) -> Result<Certificate> {
    Certificate::from_pem(pem.trim().as_bytes())
        .map_err(|error| WechatPayError::CertificateParse(error.to_string()))
}

pub fn certificate_to_pem(certificate: &Certificate) -> Result<String> {
    certificate
        .to_pem(LineEnding::LF)
        .map_err(|error| WechatPayError::CertificateParse(error.to_string()))
}

/// Renders a certificate serial as upper-case hex without DER sign padding.
pub fn certificate_serial_hex(certificate: &Certificate) -> String {
    let bytes = certificate.tbs_certificate.serial_number.as_bytes();
    let first_significant = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    bytes[first_significant..]
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect()
}

/// Extracts the RSA public key from the certificate's subject public key info.
pub fn certificate_public_key(certificate: &Certificate) -> Result<RsaPublicKey> {
    let spki_der = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|error| WechatPayError::CertificateParse(error.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki_der).map_err(|error| {
        WechatPayError::CertificateParse(format!("certificate key is not RSA: {error}"))
    })
}

/// Returns true only when `ca_pem` may issue certificates and `cert_pem` carries a
/// SHA256-with-RSA signature made by its key. Any parse failure counts as not issued.
///
/// A v3 issuer must assert `CA:TRUE` in its basic constraints, and a key usage
/// extension, when present, must include `keyCertSign`.
pub fn verify_certificate_issued_by(cert_pem: &str, ca_pem: &str) -> bool {
    match check_issued_by(cert_pem, ca_pem) {
        Ok(()) => true,
        Err(error) => {
            tracing::debug!(error = %error, "certificate issuer check failed");
            false
        }
    }
}

fn check_issued_by(cert_pem: &str, ca_pem: &str) -> Result<()> {
    let ca = parse_certificate_pem(ca_pem)?;
    let cert = parse_certificate_pem(cert_pem)?;
    ensure_can_issue(&ca)?;
    if cert.signature_algorithm.oid != SHA256_WITH_RSA_ENCRYPTION {
        return Err(WechatPayError::Verification(format!(
            "unsupported certificate signature algorithm {}",
            cert.signature_algorithm.oid
        )));
    }

    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|error| WechatPayError::CertificateParse(error.to_string()))?;
    let signature_bytes = cert.signature.as_bytes().ok_or_else(|| {
        WechatPayError::CertificateParse("certificate signature has unused bits".to_string())
    })?;
    let signature = Signature::try_from(signature_bytes)
        .map_err(|error| WechatPayError::Verification(error.to_string()))?;

    VerifyingKey::<Sha256>::new(certificate_public_key(&ca)?)
        .verify(&tbs_der, &signature)
        .map_err(|error| WechatPayError::Verification(error.to_string()))
}

fn ensure_can_issue(issuer: &Certificate) -> Result<()> {
    let extensions = issuer.tbs_certificate.extensions.as_deref();
    let mut is_ca = None;
    for extension in extensions.unwrap_or_default() {
        let value = extension.extn_value.as_bytes();
        if extension.extn_id == BASIC_CONSTRAINTS {
            let constraints = BasicConstraints::from_der(value)
                .map_err(|error| WechatPayError::CertificateParse(error.to_string()))?;
            is_ca = Some(constraints.ca);
        } else if extension.extn_id == KEY_USAGE {
            let usage = KeyUsage::from_der(value)
                .map_err(|error| WechatPayError::CertificateParse(error.to_string()))?;
            if !usage.0.contains(KeyUsages::KeyCertSign) {
                return Err(WechatPayError::Verification(
                    "issuer key usage does not permit certificate signing".to_string(),
                ));
            }
        }
    }

    let refusal = match is_ca {
        Some(true) => return Ok(()),
        Some(false) => "issuer is not a certificate authority",
        None if issuer.tbs_certificate.version == Version::V3 => "issuer has no basic constraints",
        None => return Ok(()),
    };
    Err(WechatPayError::Verification(refusal.to_string()))
}
