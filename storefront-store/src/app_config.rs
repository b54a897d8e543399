use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use storefront_core::Masked;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 key shared with the token issuer.
    pub jwt_secret: Masked<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    #[default]
    MercadoPago,
    /// In-process gateway for local development; never talks to the network.
    Mock,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub provider: PaymentProvider,
    #[serde(default)]
    pub access_token: Masked<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Public storefront URL, used for the buyer's return redirects.
    pub frontend_url: String,
    /// Public API URL, used for the provider's notification callback.
    pub backend_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_base_url() -> String { "https://api.mercadopago.com".to_string() }
fn default_timeout_seconds() -> u64 { 10 }

impl PaymentsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(Self::env_source());

        Self::from_builder(builder)
    }

    /// `STOREFRONT_PAYMENTS__ACCESS_TOKEN` sets `payments.access_token`.
    fn env_source() -> config::Environment {
        config::Environment::with_prefix("STOREFRONT")
            .prefix_separator("_")
            .separator("__")
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;

        if config.payments.provider == PaymentProvider::MercadoPago && config.payments.access_token.expose().is_empty() {
            return Err(config::ConfigError::Message(
                "payments.access_token is required for the mercadopago provider".to_string(),
            ));
        }
        Ok(config)
    }
}
