use crate::models::Credits;
use secrecy::Secret;
use service_core::config::{self as core_config, get_env, get_parsed};
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CreditConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub store: StoreBackend,
    pub mongodb: MongoConfig,
    pub paystack: PaystackConfig,
    pub smtp: SmtpConfig,
    pub ledger: LedgerConfig,
    pub signing: SigningConfig,
}

/// Where ledger state lives. `Memory` is for local runs and demos only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: Secret<String>,
    pub api_base_url: String,
    /// Where the checkout page sends the customer after paying.
    pub callback_url: Option<String>,
}

/// Secret shared with the authenticating front end that signs forwarded
/// requests.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub secret: Secret<String>,
    pub max_clock_skew_secs: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub operating_currency: String,
    pub signup_bonus: Credits,
    pub seed_default_pricing: bool,
    pub login_url: String,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl LedgerConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: self.initial_backoff,
            ..RetryConfig::default()
        }
    }
}

impl CreditConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_production();

        let store = match get_env("STORE_BACKEND", Some("mongodb"), false)?.as_str() {
            "mongodb" | "mongo" => StoreBackend::Mongo,
            "memory" if !is_prod => StoreBackend::Memory,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "unsupported STORE_BACKEND '{}'",
                    other
                )))
            }
        };

        let signup_bonus = get_env("SIGNUP_BONUS_CREDITS", Some("200"), false)?;
        let signup_bonus = signup_bonus
            .parse::<f64>()
            .ok()
            .and_then(Credits::from_decimal)
            .ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "SIGNUP_BONUS_CREDITS must be a non-negative number, got '{}'",
                    signup_bonus
                ))
            })?;

        Ok(CreditConfig {
            common,
            service_name: "credit-service".to_string(),
            store,
            mongodb: MongoConfig {
                uri: Secret::new(get_env(
                    "MONGODB_URI",
                    Some("mongodb://localhost:27017/?replicaSet=rs0"),
                    is_prod,
                )?),
                database: get_env("MONGODB_DATABASE", Some("carwash_db"), is_prod)?,
            },
            paystack: PaystackConfig {
                secret_key: Secret::new(get_env("PAYSTACK_SECRET_KEY", Some(""), is_prod)?),
                api_base_url: get_env(
                    "PAYSTACK_API_BASE_URL",
                    Some("https://api.paystack.co"),
                    false,
                )?,
                callback_url: std::env::var("PAYSTACK_CALLBACK_URL").ok(),
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: get_parsed("SMTP_PORT", Some("587"), is_prod)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: Secret::new(get_env("SMTP_PASSWORD", Some(""), is_prod)?),
                from_email: get_env("SMTP_FROM_EMAIL", Some("noreply@example.com"), is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("Carwash"), is_prod)?,
                enabled: get_parsed("SMTP_ENABLED", Some("false"), false)?,
            },
            signing: SigningConfig {
                secret: Secret::new(get_env("REQUEST_SIGNING_SECRET", Some(""), is_prod)?),
                max_clock_skew_secs: get_parsed("REQUEST_MAX_CLOCK_SKEW_SECS", Some("60"), false)?,
            },
            ledger: LedgerConfig {
                operating_currency: get_env("OPERATING_CURRENCY", Some("KES"), false)?
                    .to_uppercase(),
                signup_bonus,
                seed_default_pricing: get_parsed("SEED_DEFAULT_PRICING", Some("true"), false)?,
                login_url: get_env(
                    "CARWASH_LOGIN_URL",
                    Some("http://localhost:3000/carwash-login"),
                    is_prod,
                )?,
                max_retries: get_parsed("LEDGER_MAX_RETRIES", Some("3"), false)?,
                initial_backoff: Duration::from_millis(get_parsed(
                    "LEDGER_RETRY_BACKOFF_MS",
                    Some("50"),
                    false,
                )?),
            },
        })
    }
}
