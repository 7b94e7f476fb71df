//! `WECHATPAY2-SHA256-RSA2048` request credentials.
//!
//! Each request is signed over a canonical message built from the method,
//! the path plus raw query, a unix timestamp, a fresh nonce and the body. The
//! resulting token is what follows the schema in the `Authorization` header.

use wxpay_core::{current_unix_timestamp, generate_nonce, DEFAULT_NONCE_LEN};

use crate::error::Result;
use crate::signer::PrivateKeySigner;

pub const WECHATPAY2_SCHEMA: &str = "WECHATPAY2-SHA256-RSA2048";

/// Joins a request path and raw query the way the canonical message expects.
pub fn canonical_url(path: &str, raw_query: Option<&str>) -> String {
    match raw_query.filter(|query| !query.is_empty()) {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

/// Builds the newline-terminated message the merchant key signs.
pub fn build_message(
    method: &str,
    canonical_url: &str,
    timestamp: u64,
    nonce: &str,
    body: &str,
) -> String {
    format!("{method}\n{canonical_url}\n{timestamp}\n{nonce}\n{body}\n")
}

pub fn format_token(
    merchant_id: &str,
    nonce: &str,
    timestamp: u64,
    serial_no: &str,
    signature: &str,
) -> String {
    format!(
        "mchid=\"{merchant_id}\",nonce_str=\"{nonce}\",timestamp=\"{timestamp}\",serial_no=\"{serial_no}\",signature=\"{signature}\""
    )
}

#[derive(Debug, Clone)]
/// Merchant identity plus the signer holding its API certificate key.
pub struct WechatPay2Credentials {
    merchant_id: String,
    signer: PrivateKeySigner,
}

impl WechatPay2Credentials {
    pub fn new(merchant_id: impl Into<String>, signer: PrivateKeySigner) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            signer,
        }
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn schema(&self) -> &'static str {
        WECHATPAY2_SCHEMA
    }

    /// Signs the request with a fresh nonce and the current time.
    pub fn authorization_token(
        &self,
        method: &str,
        path: &str,
        raw_query: Option<&str>,
        body: &str,
    ) -> Result<String> {
        let nonce = generate_nonce(DEFAULT_NONCE_LEN)?;
        let timestamp = current_unix_timestamp();
        self.authorization_token_at(method, path, raw_query, body, timestamp, &nonce)
    }

    /// Deterministic variant of [`Self::authorization_token`] for a given nonce and time.
    pub fn authorization_token_at(
        &self,
        method: &str,
        path: &str,
        raw_query: Option<&str>,
        body: &str,
        timestamp: u64,
        nonce: &str,
    ) -> Result<String> {
        let url = canonical_url(path, raw_query);
        let message = build_message(method, &url, timestamp, nonce, body);
        let signed = self.signer.sign(message.as_bytes())?;
        tracing::debug!(
            merchant_id = %self.merchant_id,
            serial_no = %signed.certificate_serial_number,
            method,
            url = %url,
            timestamp,
            "signed api v3 request"
        );
        Ok(format_token(
            &self.merchant_id,
            nonce,
            timestamp,
            &signed.certificate_serial_number,
            &signed.signature,
        ))
    }

    /// Full `Authorization` header value: schema, a space, then the token.
    pub fn authorization_header(
        &self,
        method: &str,
        path: &str,
        raw_query: Option<&str>,
        body: &str,
    ) -> Result<String> {
        let token = self.authorization_token(method, path, raw_query, body)?;
        Ok(format!("{} {token}", self.schema()))
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
    use rsa::{
        pkcs1v15::{Signature, VerifyingKey},
        signature::Verifier as _,
        RsaPublicKey,
    };
    use sha2::Sha256;

    use super::{build_message, canonical_url, format_token, WechatPay2Credentials};
    use crate::pem::load_private_key_pem;
    use crate::signer::PrivateKeySigner;

    const MERCHANT_KEY_PEM: &str = include_str!("../tests/fixtures/merchant_key.pem");

    fn credentials() -> WechatPay2Credentials {
        let key = load_private_key_pem(MERCHANT_KEY_PEM).expect("fixture key");
        WechatPay2Credentials::new("1900000001", PrivateKeySigner::new("S1", key))
    }

    fn token_field<'a>(token: &'a str, name: &str) -> &'a str {
        let prefix = format!("{name}=\"");
        let start = token.find(&prefix).expect("field present") + prefix.len();
        let end = token[start..].find('"').expect("closing quote") + start;
        &token[start..end]
    }

    #[test]
    fn unit_canonical_message_for_certificate_download() {
        let message = build_message("GET", "/v3/certificates", 1_700_000_000, "abc123", "");
        assert_eq!(message, "GET\n/v3/certificates\n1700000000\nabc123\n\n");
    }

    #[test]
    fn unit_canonical_message_keeps_body_and_query() {
        let url = canonical_url("/v3/pay/transactions/id/42", Some("mchid=1900000001"));
        let message = build_message("POST", &url, 1, "n", "{\"a\":1}");
        assert_eq!(
            message,
            "POST\n/v3/pay/transactions/id/42?mchid=1900000001\n1\nn\n{\"a\":1}\n"
        );
        let path = "/v3/certificates";
        assert_eq!(canonical_url(path, Some("")), path);
        assert_eq!(canonical_url(path, None), path);
    }

    #[test]
    fn unit_token_layout_matches_header_grammar() {
        let token = format_token("M1", "abc123", 1_700_000_000, "S1", "sig==");
        assert_eq!(
            token,
            "mchid=\"M1\",nonce_str=\"abc123\",timestamp=\"1700000000\",serial_no=\"S1\",signature=\"sig==\""
        );
    }

    #[test]
    fn functional_authorization_token_signs_canonical_message() {
        let credentials = credentials();
        let token = credentials
            .authorization_token("GET", "/v3/certificates", None, "")
            .expect("token");
        assert_eq!(token_field(&token, "mchid"), "1900000001");
        assert_eq!(token_field(&token, "serial_no"), "S1");
        let nonce = token_field(&token, "nonce_str");
        assert_eq!(nonce.len(), 20);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        let timestamp: u64 = token_field(&token, "timestamp").parse().expect("timestamp");

        let message = build_message("GET", "/v3/certificates", timestamp, nonce, "");
        let raw = BASE64_STANDARD
            .decode(token_field(&token, "signature"))
            .expect("base64 signature");
        let public_key = RsaPublicKey::from(load_private_key_pem(MERCHANT_KEY_PEM).expect("key"));
        VerifyingKey::<Sha256>::new(public_key)
            .verify(
                message.as_bytes(),
                &Signature::try_from(raw.as_slice()).expect("signature"),
            )
            .expect("token signature must cover the canonical message");
    }

    #[test]
    fn unit_authorization_header_is_prefixed_with_schema() {
        let header = credentials()
            .authorization_header("POST", "/v3/refund/domestic/refunds", None, "{}")
            .expect("header");
        assert!(header.starts_with("WECHATPAY2-SHA256-RSA2048 mchid=\"1900000001\","));
    }
}
