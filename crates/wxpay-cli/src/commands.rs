use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use wxpay_auth::{
    certificate_to_pem, load_private_key_file, AutoRefreshingVerifier, CertificateTrustStore,
    PrivateKeySigner, Url, VerifierConfig, WechatPay2Credentials,
};
use wxpay_core::write_text_atomic;

use crate::cli_args::{AuthorizationArgs, CertificatesArgs, Cli, Command, MerchantArgs};

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let credentials = load_credentials(&cli.merchant)?;
    match cli.command {
        Command::Certificates(args) => {
            let timeout_ms = cli.merchant.request_timeout_ms;
            let serials = download_certificates(credentials, &args, timeout_ms).await?;
            for serial in serials {
                println!("{serial}");
            }
        }
        Command::Authorization(args) => {
            println!("{}", authorization_header(&credentials, &args)?);
        }
    }
    Ok(())
}

fn load_credentials(merchant: &MerchantArgs) -> Result<WechatPay2Credentials> {
    let key = load_private_key_file(&merchant.private_key).with_context(|| {
        format!(
            "failed to load merchant private key {}",
            merchant.private_key.display()
        )
    })?;
    Ok(WechatPay2Credentials::new(
        merchant.merchant_id.clone(),
        PrivateKeySigner::new(merchant.merchant_serial.clone(), key),
    ))
}

async fn download_certificates(
    credentials: WechatPay2Credentials,
    args: &CertificatesArgs,
    request_timeout_ms: u64,
) -> Result<Vec<String>> {
    let config = VerifierConfig {
        certificates_url: args.certificates_url.clone(),
        ttl_secs: args.ttl_secs,
        request_timeout_ms,
    };
    let verifier = AutoRefreshingVerifier::new(credentials, args.api_v3_key.as_bytes(), config)?;
    let url = &args.certificates_url;
    verifier
        .refresh()
        .await
        .with_context(|| format!("failed to download certificates from {url}"))?;

    if let Some(output_dir) = &args.output_dir {
        let written = export_certificates(verifier.store(), output_dir)?;
        tracing::info!(
            count = written.len(),
            dir = %output_dir.display(),
            "exported platform certificates"
        );
    }
    Ok(verifier.store().serial_numbers())
}

/// Writes every trusted certificate to `<serial>.pem` under `output_dir`.
fn export_certificates(store: &CertificateTrustStore, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let mut written = Vec::new();
    for serial in store.serial_numbers() {
        let trusted = store.lookup(&serial)?;
        let pem = certificate_to_pem(trusted.certificate())?;
        let path = output_dir.join(format!("{serial}.pem"));
        write_text_atomic(&path, &pem)?;
        written.push(path);
    }
    Ok(written)
}

fn authorization_header(
    credentials: &WechatPay2Credentials,
    args: &AuthorizationArgs,
) -> Result<String> {
    let url = Url::parse(&args.url).with_context(|| format!("invalid url '{}'", args.url))?;
    let header =
        credentials.authorization_header(&args.method, url.path(), url.query(), &args.body)?;
    Ok(header)
}
