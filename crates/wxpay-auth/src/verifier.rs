//! Platform-certificate verifier that keeps its trust store current.
//!
//! Certificates are downloaded from the `/v3/certificates` endpoint, decrypted
//! with the API v3 key and merged into the shared [`CertificateTrustStore`].
//! A refresh runs when the store is empty or the last successful refresh is
//! older than the TTL. At most one refresh runs at a time. Callers that find
//! the store stale queue on the refresh lock and skip the download when
//! another refresh attempt completed while they waited.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use reqwest::{header::HeaderMap, Method};
use serde::Deserialize;
use tokio::sync::Mutex;
use wxpay_core::{current_unix_timestamp, seconds_since};

use crate::aes::{decrypt_aes_256_gcm, API_V3_KEY_BYTES};
use crate::client::{
    build_http_client, send_signed_request, ClientConfig, DEFAULT_REQUEST_TIMEOUT_MS,
};
use crate::credentials::WechatPay2Credentials;
use crate::error::{Result, WechatPayError};
use crate::pem::parse_certificate_pem;
use crate::trust_store::{CertificateTrustStore, TrustedCertificate};
use crate::validator::{ResponseSignatureHeaders, ResponseValidator};

pub const WECHATPAY_CERTIFICATES_URL: &str = "https://api.mch.weixin.qq.com/v3/certificates";
pub const DEFAULT_CERTIFICATE_TTL_SECS: u64 = 3_600;

type ClockFn = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub certificates_url: String,
    pub ttl_secs: u64,
    pub request_timeout_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            certificates_url: WECHATPAY_CERTIFICATES_URL.to_string(),
            ttl_secs: DEFAULT_CERTIFICATE_TTL_SECS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CertificateBundle {
    #[serde(default)]
    data: Vec<CertificateBundleEntry>,
}

#[derive(Debug, Deserialize)]
struct CertificateBundleEntry {
    #[serde(default)]
    serial_no: Option<String>,
    encrypt_certificate: EncryptedCertificate,
}

#[derive(Debug, Clone, Deserialize)]
/// The `encrypt_certificate` object of a certificate download entry.
pub struct EncryptedCertificate {
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub associated_data: String,
    pub nonce: String,
    pub ciphertext: String,
}

impl EncryptedCertificate {
    /// Decrypts the PEM payload and parses it into a trusted certificate.
    pub fn open(&self, api_v3_key: &[u8]) -> Result<TrustedCertificate> {
        let pem = decrypt_aes_256_gcm(
            self.associated_data.as_bytes(),
            self.nonce.as_bytes(),
            &self.ciphertext,
            api_v3_key,
        )?;
        TrustedCertificate::from_certificate(parse_certificate_pem(&pem)?)
    }
}

pub struct AutoRefreshingVerifier {
    store: Arc<CertificateTrustStore>,
    credentials: WechatPay2Credentials,
    api_v3_key: [u8; API_V3_KEY_BYTES],
    http: reqwest::Client,
    config: VerifierConfig,
    refresh_lock: Mutex<()>,
    refresh_attempts: AtomicU64,
    last_update_unix: AtomicU64,
    clock: ClockFn,
}

impl AutoRefreshingVerifier {
    pub fn new(
        credentials: WechatPay2Credentials,
        api_v3_key: impl AsRef<[u8]>,
        config: VerifierConfig,
    ) -> Result<Self> {
        let key = api_v3_key.as_ref();
        let api_v3_key: [u8; API_V3_KEY_BYTES] = key
            .try_into()
            .map_err(|_| WechatPayError::InvalidKeyLength(key.len()))?;
        let user_agent = ClientConfig::default().user_agent;
        let http = build_http_client(config.request_timeout_ms, &user_agent)?;
        Ok(Self {
            store: Arc::new(CertificateTrustStore::new()),
            credentials,
            api_v3_key,
            http,
            config,
            refresh_lock: Mutex::new(()),
            refresh_attempts: AtomicU64::new(0),
            last_update_unix: AtomicU64::new(0),
            clock: Arc::new(current_unix_timestamp),
        })
    }

    /// Replaces the wall clock used for freshness checks.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<CertificateTrustStore> {
        &self.store
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Unix time of the last successful refresh, zero if none has completed.
    pub fn last_update_unix(&self) -> u64 {
        self.last_update_unix.load(Ordering::Acquire)
    }

    /// Forces the next verification to refresh the certificates.
    pub fn invalidate(&self) {
        self.last_update_unix.store(0, Ordering::Release);
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at((self.clock)())
    }

    fn is_stale_at(&self, now_unix: u64) -> bool {
        let last_update = self.last_update_unix();
        last_update == 0
            || self.store.is_empty()
            || seconds_since(last_update, now_unix) > self.config.ttl_secs
    }

    /// Verifies a platform signature, refreshing the certificates first when stale.
    ///
    /// A caller that queued behind another refresh attempt uses whatever that
    /// attempt left in the store, even when the download returned nothing.
    pub async fn verify(&self, serial: &str, message: &[u8], signature: &str) -> Result<bool> {
        if self.is_stale() {
            let seen_attempts = self.refresh_attempts.load(Ordering::Acquire);
            let _guard = self.refresh_lock.lock().await;
            if self.refresh_attempts.load(Ordering::Acquire) != seen_attempts {
                tracing::debug!("platform certificates refreshed by a concurrent caller");
            } else if self.is_stale() {
                self.refresh_locked().await?;
            }
        }
        self.store.verify_signature(serial, message, signature)
    }

    /// Validates a response's trust headers and body through [`Self::verify`].
    pub async fn validate_response(&self, headers: &HeaderMap, body: &str) -> Result<bool> {
        let signed = ResponseSignatureHeaders::from_headers(headers)?;
        self.verify(
            &signed.serial,
            signed.message(body).as_bytes(),
            &signed.signature,
        )
        .await
    }

    /// Downloads and merges certificates now, regardless of freshness.
    pub async fn refresh(&self) -> Result<usize> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<usize> {
        let outcome = self.download_and_merge().await;
        self.refresh_attempts.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn download_and_merge(&self) -> Result<usize> {
        let bootstrap = self.store.is_empty();
        // Without any trusted certificate there is nothing to check the download against.
        let validator = if bootstrap {
            ResponseValidator::Noop
        } else {
            ResponseValidator::Platform(Arc::clone(&self.store))
        };
        tracing::info!(
            url = %self.config.certificates_url,
            bootstrap,
            known_certificates = self.store.len(),
            "refreshing platform certificates"
        );

        let response = send_signed_request(
            &self.http,
            &self.credentials,
            Method::GET,
            &self.config.certificates_url,
            None,
        )
        .await
        .inspect_err(|error| tracing::warn!(error = %error, "certificate download failed"))?;

        if !validator.validate(&response.headers, &response.body)? {
            tracing::warn!("certificate download carried a bad platform signature");
            return Err(WechatPayError::SignatureMismatch);
        }

        let bundle: CertificateBundle = serde_json::from_str(&response.body)?;
        let certificates = self.open_bundle(&bundle)?;
        let merged = self.store.merge(certificates);
        let now = (self.clock)();
        self.last_update_unix.store(now, Ordering::Release);
        tracing::info!(
            merged,
            total = self.store.len(),
            "platform certificates refreshed"
        );
        Ok(merged)
    }

    // All entries must open before anything is merged.
    fn open_bundle(&self, bundle: &CertificateBundle) -> Result<Vec<TrustedCertificate>> {
        let mut certificates = Vec::with_capacity(bundle.data.len());
        for entry in &bundle.data {
            let certificate = entry
                .encrypt_certificate
                .open(&self.api_v3_key)
                .inspect_err(|error| {
                    tracing::warn!(
                        serial_no = entry.serial_no.as_deref().unwrap_or("-"),
                        error = %error,
                        "failed to open downloaded platform certificate"
                    )
                })?;
            if let Some(listed) = entry.serial_no.as_deref() {
                if !listed.eq_ignore_ascii_case(certificate.serial_number()) {
                    tracing::debug!(
                        listed,
                        parsed = certificate.serial_number(),
                        "listed serial differs from certificate serial"
                    );
                }
            }
            certificates.push(certificate);
        }
        Ok(certificates)
    }
}

impl fmt::Debug for AutoRefreshingVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoRefreshingVerifier")
            .field("merchant_id", &self.credentials.merchant_id())
            .field("config", &self.config)
            .field("certificates", &self.store.len())
            .field("last_update_unix", &self.last_update_unix())
            .field("api_v3_key", &"[REDACTED]")
            .finish()
    }
}
