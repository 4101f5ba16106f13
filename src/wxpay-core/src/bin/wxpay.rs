//! wxpay CLI - signed calls against the WeChat Pay API v3.
//!
//! Merchant settings come from flags or `WXPAY_*` environment variables.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use wxpay_core::credential::{build_message, generate_nonce};
use wxpay_core::https::canonical_url;
use wxpay_core::{
    ApiV3Key, ClientConfig, EncryptedResource, PayError, PlatformCertificate, WechatPayClient,
    WechatPayCredentials,
};
use wxpay_crypto::{load_private_key_pem, RsaPrivateKey, Sha256WithRsaSigner};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// wxpay - WeChat Pay API v3 client.
///
/// Signs requests with the merchant private key and verifies every
/// response against the platform certificates.
#[derive(Parser)]
#[command(name = "wxpay")]
#[command(version = VERSION)]
#[command(about = "Signed calls against the WeChat Pay API v3")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    #[command(flatten)]
    merchant: MerchantArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct MerchantArgs {
    /// Merchant ID
    #[arg(long, env = "WXPAY_MCHID", global = true)]
    mchid: Option<String>,

    /// Merchant certificate serial number
    #[arg(long, env = "WXPAY_SERIAL_NO", global = true)]
    serial_no: Option<String>,

    /// Merchant private key (PEM file)
    #[arg(long, env = "WXPAY_PRIVATE_KEY", global = true)]
    private_key: Option<PathBuf>,

    /// API v3 key (32 characters)
    #[arg(long, env = "WXPAY_API_V3_KEY", global = true, hide_env_values = true)]
    api_v3_key: Option<String>,

    /// Trusted platform certificate (PEM file), repeatable
    #[arg(long = "platform-cert", env = "WXPAY_PLATFORM_CERT", global = true, value_delimiter = ',')]
    platform_certs: Vec<PathBuf>,

    /// API base URL
    #[arg(long, env = "WXPAY_BASE_URL", global = true, default_value = wxpay_core::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh and list the platform certificates
    Certificates,

    /// Query an order
    Order {
        /// Provider transaction id
        #[arg(long, conflicts_with = "out_trade_no", required_unless_present = "out_trade_no")]
        transaction_id: Option<String>,

        /// Merchant trade number
        #[arg(long)]
        out_trade_no: Option<String>,
    },

    /// Decrypt an AEAD_AES_256_GCM resource with the API v3 key
    Decrypt {
        /// Base64 ciphertext
        #[arg(long)]
        ciphertext: String,

        /// Nonce
        #[arg(long)]
        nonce: String,

        /// Associated data
        #[arg(long, default_value = "")]
        associated_data: String,
    },

    /// Print the canonical message and Authorization header for a request
    Sign {
        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Request path with query, or absolute URL
        #[arg(long)]
        url: String,

        /// Request body
        #[arg(long, default_value = "")]
        body: String,

        /// Fixed Unix timestamp (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,

        /// Fixed nonce (defaults to a fresh one)
        #[arg(long)]
        nonce: Option<String>,
    },
}

impl MerchantArgs {
    fn merchant_key(&self) -> Result<RsaPrivateKey, PayError> {
        let path = self
            .private_key
            .as_deref()
            .ok_or_else(|| PayError::config("missing --private-key / WXPAY_PRIVATE_KEY"))?;
        Ok(load_private_key_pem(&read_file(path)?)?)
    }

    fn credentials(&self, key: RsaPrivateKey) -> Result<WechatPayCredentials, PayError> {
        let mchid = require(self.mchid.as_deref(), "--mchid / WXPAY_MCHID")?;
        let serial_no = require(self.serial_no.as_deref(), "--serial-no / WXPAY_SERIAL_NO")?;
        WechatPayCredentials::new(mchid, Sha256WithRsaSigner::new(serial_no, key)?)
    }

    fn api_v3_key(&self) -> Result<ApiV3Key, PayError> {
        ApiV3Key::new(require(self.api_v3_key.as_deref(), "--api-v3-key / WXPAY_API_V3_KEY")?)
    }

    fn client(&self) -> Result<WechatPayClient, PayError> {
        let config = ClientConfig::default()
            .with_base_url(self.base_url.as_str())
            .with_timeout(std::time::Duration::from_secs(self.timeout));
        let certificates = self
            .platform_certs
            .iter()
            .map(|path| PlatformCertificate::from_pem(&read_file(path)?))
            .collect::<Result<Vec<_>, _>>()?;
        let key = self.merchant_key()?;
        let credentials = self.credentials(key.clone())?;
        Ok(WechatPayClient::new(&config, credentials, self.api_v3_key()?, certificates)?
            .with_merchant_key(key))
    }
}

fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, PayError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PayError::config(format!("missing {name}")))
}

fn read_file(path: &Path) -> Result<String, PayError> {
    std::fs::read_to_string(path)
        .map_err(|e| PayError::config(format!("Failed to read {}: {e}", path.display())))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), PayError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_certificates(merchant: &MerchantArgs, json: bool) -> Result<(), PayError> {
    let client = merchant.client()?;
    let report = client.refresh_certificates().await?;
    let certificates = client.certificate_store().certificates();

    if json {
        let listed: Vec<_> = certificates
            .iter()
            .map(|c| {
                serde_json::json!({
                    "serial_no": c.serial_number(),
                    "effective_time": c.effective_time().to_rfc3339(),
                    "expire_time": c.expire_time().to_rfc3339(),
                })
            })
            .collect();
        return print_json(&serde_json::json!({ "refresh": report, "certificates": listed }));
    }

    println!("Refresh:");
    println!("  inserted:          {}", report.inserted.len());
    println!("  skipped (expired): {}", report.skipped_expired.len());
    println!("  skipped (known):   {}", report.skipped_duplicate.len());
    println!("  failed:            {}", report.failed.len());
    println!();
    println!("Platform certificates ({}):", certificates.len());
    for c in &certificates {
        println!(
            "  {}  {} .. {}",
            c.serial_number(),
            c.effective_time().format("%Y-%m-%d"),
            c.expire_time().format("%Y-%m-%d")
        );
    }
    Ok(())
}

async fn run_order(
    merchant: &MerchantArgs,
    transaction_id: Option<&str>,
    out_trade_no: Option<&str>,
    json: bool,
) -> Result<(), PayError> {
    let client = merchant.client()?;
    client.refresh_certificates().await?;
    let order = match (transaction_id, out_trade_no) {
        (Some(id), _) => client.query_order_by_transaction_id(id).await?,
        (None, Some(no)) => client.query_order_by_out_trade_no(no).await?,
        (None, None) => return Err(PayError::config("missing --transaction-id or --out-trade-no")),
    };

    if json {
        return print_json(&order);
    }
    println!("Order {}", order.out_trade_no);
    println!("  transaction_id: {}", order.transaction_id);
    println!("  trade_state:    {} ({})", order.trade_state, order.trade_state_desc);
    println!("  trade_type:     {}", order.trade_type);
    println!("  total:          {} {}", order.amount.total, order.amount.currency);
    println!("  payer_total:    {}", order.amount.payer_total);
    if let Some(time) = order.success_time {
        println!("  success_time:   {}", time.to_rfc3339());
    }
    Ok(())
}

fn run_decrypt(
    merchant: &MerchantArgs,
    resource: &EncryptedResource,
    json: bool,
) -> Result<(), PayError> {
    let plaintext = resource.decrypt_to_string(&merchant.api_v3_key()?)?;
    if json {
        return print_json(&serde_json::json!({ "plaintext": plaintext }));
    }
    println!("{plaintext}");
    Ok(())
}

fn run_sign(
    merchant: &MerchantArgs,
    method: &str,
    url: &str,
    body: &str,
    timestamp: Option<i64>,
    nonce: Option<String>,
    json: bool,
) -> Result<(), PayError> {
    let credentials = merchant.credentials(merchant.merchant_key()?)?;
    let parsed = if url.starts_with("http://") || url.starts_with("https://") {
        reqwest::Url::parse(url)
    } else {
        reqwest::Url::parse(&format!("{}{}", merchant.base_url.trim_end_matches('/'), url))
    }
    .map_err(|e| PayError::malformed(format!("Invalid URL {url}: {e}")))?;

    let method = method.to_ascii_uppercase();
    let canonical = canonical_url(&parsed);
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let nonce = nonce.unwrap_or_else(generate_nonce);
    let message = build_message(&method, &canonical, timestamp, &nonce, body);
    let header = credentials.authorization_with(&method, &canonical, body, timestamp, &nonce)?;

    if json {
        return print_json(&serde_json::json!({
            "message": message,
            "authorization": header,
        }));
    }
    println!("Canonical message:");
    for line in message.split_terminator('\n') {
        println!("  {line}");
    }
    println!();
    println!("Authorization: {header}");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let json_output = cli.format == "json";

    if json_output {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Certificates => run_certificates(&cli.merchant, json_output).await,
        Commands::Order {
            transaction_id,
            out_trade_no,
        } => {
            run_order(
                &cli.merchant,
                transaction_id.as_deref(),
                out_trade_no.as_deref(),
                json_output,
            )
            .await
        },
        Commands::Decrypt {
            ciphertext,
            nonce,
            associated_data,
        } => {
            let resource = EncryptedResource {
                algorithm: wxpay_crypto::AEAD_AES_256_GCM.to_string(),
                ciphertext,
                associated_data,
                nonce,
                original_type: None,
            };
            run_decrypt(&cli.merchant, &resource, json_output)
        },
        Commands::Sign {
            method,
            url,
            body,
            timestamp,
            nonce,
        } => run_sign(&cli.merchant, &method, &url, &body, timestamp, nonce, json_output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json_output {
                println!(
                    "{}",
                    serde_json::json!({
                        "error": e.to_string(),
                        "request_id": e.request_id(),
                    })
                );
            } else {
                eprintln!("Error: {e}");
                if let Some(request_id) = e.request_id() {
                    eprintln!("  request-id: {request_id}");
                }
            }
            ExitCode::FAILURE
        },
    }
}
