use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use wxpay_auth::{
    DEFAULT_CERTIFICATE_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_MS, WECHATPAY_CERTIFICATES_URL,
};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_api_v3_key(value: &str) -> Result<String, String> {
    if value.len() != wxpay_auth::API_V3_KEY_BYTES {
        return Err(format!(
            "api v3 key must be {} bytes, got {}",
            wxpay_auth::API_V3_KEY_BYTES,
            value.len()
        ));
    }
    Ok(value.to_string())
}

fn parse_http_method(value: &str) -> Result<String, String> {
    let method = value.trim().to_ascii_uppercase();
    match method.as_str() {
        "GET" | "POST" | "PUT" | "PATCH" | "DELETE" => Ok(method),
        _ => Err(format!("unsupported http method '{value}'")),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "wxpay",
    about = "WeChat Pay API v3 request signing and platform certificate tool",
    version
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) merchant: MerchantArgs,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Args)]
pub(crate) struct MerchantArgs {
    #[arg(
        long = "merchant-id",
        env = "WXPAY_MERCHANT_ID",
        help = "Merchant id (mchid) placed in the Authorization token"
    )]
    pub(crate) merchant_id: String,

    #[arg(
        long = "merchant-serial",
        env = "WXPAY_MERCHANT_SERIAL",
        help = "Serial number of the merchant API certificate"
    )]
    pub(crate) merchant_serial: String,

    #[arg(
        long = "private-key",
        env = "WXPAY_PRIVATE_KEY_PATH",
        help = "Path to the merchant RSA private key (PKCS#8 or PKCS#1 PEM)"
    )]
    pub(crate) private_key: PathBuf,

    #[arg(
        long = "request-timeout-ms",
        env = "WXPAY_REQUEST_TIMEOUT_MS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "HTTP timeout for API calls in milliseconds"
    )]
    pub(crate) request_timeout_ms: u64,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Download, decrypt and list the platform certificates.
    Certificates(CertificatesArgs),
    /// Print the Authorization header for a request.
    Authorization(AuthorizationArgs),
}

#[derive(Debug, Args)]
pub(crate) struct CertificatesArgs {
    #[arg(
        long = "api-v3-key",
        env = "WXPAY_API_V3_KEY",
        hide_env_values = true,
        value_parser = parse_api_v3_key,
        help = "32-byte API v3 key used to decrypt downloaded certificates"
    )]
    pub(crate) api_v3_key: String,

    #[arg(
        long = "certificates-url",
        env = "WXPAY_CERTIFICATES_URL",
        default_value = WECHATPAY_CERTIFICATES_URL,
        help = "Certificate download endpoint"
    )]
    pub(crate) certificates_url: String,

    #[arg(
        long = "ttl-secs",
        default_value_t = DEFAULT_CERTIFICATE_TTL_SECS,
        value_parser = parse_positive_u64,
        help = "Freshness window for downloaded certificates"
    )]
    pub(crate) ttl_secs: u64,

    #[arg(
        long = "output-dir",
        help = "Write each certificate to <serial>.pem under this directory"
    )]
    pub(crate) output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub(crate) struct AuthorizationArgs {
    #[arg(long, default_value = "GET", value_parser = parse_http_method)]
    pub(crate) method: String,

    #[arg(
        long,
        help = "Absolute request URL; only its path and query are signed"
    )]
    pub(crate) url: String,

    #[arg(
        long,
        default_value = "",
        help = "Request body exactly as it will be sent"
    )]
    pub(crate) body: String,
}
