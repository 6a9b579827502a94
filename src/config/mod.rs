use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub business: BusinessConfig,
    pub whatsapp: WhatsAppConfig,
    pub sms: SmsConfig,
    pub retry: RetryConfig,
    pub service_name: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL used when rendering receipt links in outbound messages.
    pub public_base_url: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Identity of the business the dashboard runs for. Rendered into every
/// outbound message template.
#[derive(Clone, Debug)]
pub struct BusinessConfig {
    pub name: String,
    pub upi_vpa: String,
    pub support_phone: String,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    /// Initial value of the persisted WhatsApp-first flag. Only used until a
    /// settings snapshot exists.
    pub enabled_by_default: bool,
    /// Country calling code prepended to local numbers, without the '+'.
    pub country_code: String,
}

#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: Secret<String>,
    pub from_number: String,
    pub enabled_by_default: bool,
    /// Operator flag: when set the SMS transport never performs network I/O
    /// and every send resolves to a simulated receipt.
    pub simulate_transport: bool,
    /// Backend proxy tried before the direct provider call, when configured.
    pub proxy_url: Option<String>,
    /// Direct provider endpoint for the non-simulated path.
    pub api_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Sweep interval of the background retry worker.
    pub poll_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("BILLDESK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("BILLDESK_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;
        let public_base_url = env::var("BILLDESK_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        let data_dir = env::var("BILLDESK_DATA_DIR").unwrap_or_else(|_| "data".to_string());

        let business_name =
            env::var("BUSINESS_NAME").unwrap_or_else(|_| "Mammta's Food".to_string());
        let upi_vpa = env::var("BUSINESS_UPI_VPA").unwrap_or_else(|_| "mammtas@upi".to_string());
        let support_phone =
            env::var("BUSINESS_SUPPORT_PHONE").unwrap_or_else(|_| "+91 9876543210".to_string());

        let whatsapp_enabled = env::var("WHATSAPP_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let country_code = env::var("WHATSAPP_COUNTRY_CODE").unwrap_or_else(|_| "91".to_string());

        let account_sid =
            env::var("SMS_ACCOUNT_SID").unwrap_or_else(|_| "DUMMY_ACCOUNT_SID".to_string());
        let auth_token =
            env::var("SMS_AUTH_TOKEN").unwrap_or_else(|_| "DUMMY_AUTH_TOKEN".to_string());
        let from_number = env::var("SMS_FROM_NUMBER").unwrap_or_else(|_| "+15005550006".to_string());
        let sms_enabled = env::var("SMS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let simulate_transport = env::var("SMS_SIMULATE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let poll_interval_ms = env::var("RETRY_POLL_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);

        Ok(Self {
            server: ServerConfig {
                host,
                port,
                public_base_url,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from(data_dir),
            },
            business: BusinessConfig {
                name: business_name,
                upi_vpa,
                support_phone,
            },
            whatsapp: WhatsAppConfig {
                enabled_by_default: whatsapp_enabled,
                country_code,
            },
            sms: SmsConfig {
                account_sid,
                auth_token: Secret::new(auth_token),
                from_number,
                enabled_by_default: sms_enabled,
                simulate_transport,
                proxy_url: env::var("SMS_PROXY_URL").ok(),
                api_url: env::var("SMS_API_URL").ok(),
            },
            retry: RetryConfig { poll_interval_ms },
            service_name: "billdesk".to_string(),
        })
    }
}
