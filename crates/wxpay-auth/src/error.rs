use thiserror::Error;

/// Coarse classification used by callers to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad key material or settings; the caller must fix its setup.
    Config,
    /// A sign, verify, decrypt or parse operation failed.
    Crypto,
    /// The peer could not be authenticated; reject the request/response.
    Trust,
    /// Network or protocol failure talking to the API.
    Transport,
}

#[derive(Debug, Error)]
/// Enumerates failures of the WeChat Pay signing and trust layer.
pub enum WechatPayError {
    #[error("invalid API v3 key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("invalid AES-GCM nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),
    #[error("invalid merchant private key: {0}")]
    InvalidPrivateKey(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("random source failed: {0}")]
    Randomness(#[from] wxpay_core::NonceError),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("ciphertext authentication failed (tampered payload or wrong key)")]
    AuthenticationFailure,
    #[error("certificate parse error: {0}")]
    CertificateParse(String),
    #[error("signature verification error: {0}")]
    Verification(String),
    #[error("unknown platform certificate serial number '{0}'")]
    UnknownCertificate(String),
    #[error("response is missing signature headers: {}", .0.join(", "))]
    MissingHeaders(Vec<&'static str>),
    #[error("response signature does not match")]
    SignatureMismatch,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl WechatPayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKeyLength(_)
            | Self::InvalidNonceLength(_)
            | Self::InvalidPrivateKey(_)
            | Self::InvalidConfig(_) => ErrorKind::Config,
            Self::Signing(_)
            | Self::Randomness(_)
            | Self::Encryption(_)
            | Self::Decode(_)
            | Self::AuthenticationFailure
            | Self::CertificateParse(_)
            | Self::Verification(_) => ErrorKind::Crypto,
            Self::UnknownCertificate(_) | Self::MissingHeaders(_) | Self::SignatureMismatch => {
                ErrorKind::Trust
            }
            Self::Http(_) | Self::HttpStatus { .. } | Self::Serde(_) => ErrorKind::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, WechatPayError>;

#[cfg(test)]
mod tests {
    use super::{ErrorKind, WechatPayError};

    #[test]
    fn unit_classifies_errors_into_taxonomy() {
        let short_key = WechatPayError::InvalidKeyLength(16);
        assert_eq!(short_key.kind(), ErrorKind::Config);
        let tampered = WechatPayError::AuthenticationFailure;
        assert_eq!(tampered.kind(), ErrorKind::Crypto);
        let unknown = WechatPayError::UnknownCertificate("ABC".to_string());
        assert_eq!(unknown.kind(), ErrorKind::Trust);
        let rejected = WechatPayError::HttpStatus {
            status: 500,
            body: String::new(),
        };
        assert_eq!(rejected.kind(), ErrorKind::Transport);
    }

    #[test]
    fn unit_missing_headers_message_lists_names() {
        let error = WechatPayError::MissingHeaders(vec!["Wechatpay-Serial", "Wechatpay-Nonce"]);
        assert_eq!(
            error.to_string(),
            "response is missing signature headers: Wechatpay-Serial, Wechatpay-Nonce"
        );
    }
}
