//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use subwatch_core::SubscriptionOptions;

use crate::stripe::StripeClient;

/// Default port when neither `LISTEN_ADDR` nor `PORT` is set.
const DEFAULT_PORT: u16 = 5000;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:5000").
    pub listen_addr: String,

    /// Stripe secret API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// Stripe API base URL.
    pub stripe_api_base: String,

    /// Redirect after a completed checkout.
    pub checkout_success_url: String,

    /// Redirect after an abandoned checkout.
    pub checkout_cancel_url: String,

    /// Trial and coupon behavior for checkouts.
    pub subscription_options: SubscriptionOptions,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| {
                let port = env_parse("PORT").unwrap_or(DEFAULT_PORT);
                format!("0.0.0.0:{port}")
            }),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| StripeClient::BASE_URL.into()),
            checkout_success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| format!("{frontend_url}/success")),
            checkout_cancel_url: std::env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| format!("{frontend_url}/cancel")),
            subscription_options: SubscriptionOptions {
                trial_period_days: env_parse("TRIAL_PERIOD_DAYS"),
                allow_coupon: std::env::var("ALLOW_COUPON")
                    .ok()
                    .is_some_and(|v| parse_flag(&v)),
            },
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [".secrets/stripe.json", "../.secrets/stripe.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.api_key), secrets.webhook_secret);
        }
    }

    // Fall back to environment variables
    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY")
            .or_else(|_| std::env::var("STRIPE_SECRET_KEY"))
            .ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: StripeClient::BASE_URL.into(),
            checkout_success_url: "http://localhost:3000/success".into(),
            checkout_cancel_url: "http://localhost:3000/cancel".into(),
            subscription_options: SubscriptionOptions::default(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
