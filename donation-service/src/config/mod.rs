use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub stripe: StripeConfig,
    pub bank_verify: BankVerifyConfig,
    /// Currency applied to every donation in this deployment.
    pub currency: String,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

/// Cache and notification-queue backend. Both are optional: an absent URL
/// disables the cache, an absent queue name disables notifications, and
/// the service behaves identically either way (just slower / quieter).
#[derive(Deserialize, Clone, Debug)]
pub struct CacheConfig {
    pub url: Option<Secret<String>>,
    pub queue: Option<String>,
    pub ttl_seconds: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    /// Maximum accepted age of a webhook signature timestamp.
    pub signature_tolerance_secs: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BankVerifyConfig {
    /// Base URL of the bank-transfer verification endpoint. Empty = not
    /// configured for this deployment.
    pub base_url: String,
    /// OCR endpoint used to recover a transaction id from a receipt image.
    pub ocr_url: String,
    pub api_key: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("DONATION_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("DONATION_SERVICE_PORT")
            .unwrap_or_else(|_| "3004".to_string())
            .parse()?;

        let db_url = env::var("DONATION_DATABASE_URL").expect("DONATION_DATABASE_URL must be set");
        let db_name =
            env::var("DONATION_DATABASE_NAME").unwrap_or_else(|_| "donation_db".to_string());

        let redis_url = env::var("DONATION_REDIS_URL").ok().map(Secret::new);
        let queue = env::var("DONATION_QUEUE_NAME").ok();
        let ttl_seconds = env::var("DONATION_CACHE_TTL_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();
        let stripe_api_base_url = env::var("STRIPE_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string());

        let bank_verify_base_url = env::var("BANK_VERIFY_BASE_URL").unwrap_or_default();
        let bank_verify_ocr_url = env::var("BANK_VERIFY_OCR_URL").unwrap_or_default();
        let bank_verify_api_key = env::var("BANK_VERIFY_API_KEY").unwrap_or_default();

        let currency = env::var("DONATION_CURRENCY").unwrap_or_else(|_| "usd".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            cache: CacheConfig {
                url: redis_url,
                queue,
                ttl_seconds,
            },
            stripe: StripeConfig {
                secret_key: Secret::new(stripe_secret_key),
                webhook_secret: Secret::new(stripe_webhook_secret),
                api_base_url: stripe_api_base_url,
                signature_tolerance_secs: 300,
            },
            bank_verify: BankVerifyConfig {
                base_url: bank_verify_base_url,
                ocr_url: bank_verify_ocr_url,
                api_key: Secret::new(bank_verify_api_key),
            },
            currency,
            service_name: "donation-service".to_string(),
        })
    }
}
