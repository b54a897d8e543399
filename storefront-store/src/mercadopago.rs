//! HTTP adapter for the Mercado Pago Checkout Pro API.
//!
//! All provider specifics (endpoint paths, payload shape, error bodies) stay
//! in this module; callers only ever see [`GatewayError`].

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use storefront_core::{GatewayError, Masked, Payment, PaymentGateway, PaymentRedirect, PreferenceItem};

use crate::app_config::PaymentsConfig;

#[derive(Debug, Serialize, PartialEq)]
struct BackUrls {
    success: String,
    failure: String,
    pending: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct PreferenceBody<'a> {
    items: &'a [PreferenceItem],
    back_urls: BackUrls,
    auto_return: &'static str,
    external_reference: String,
    notification_url: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
    #[serde(default)]
    sandbox_init_point: Option<String>,
}

pub struct MercadoPagoClient {
    client: Client,
    api_base_url: String,
    access_token: Masked<String>,
    frontend_url: String,
    backend_url: String,
}

impl MercadoPagoClient {
    pub fn new(config: &PaymentsConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
            backend_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    /// Lookups are idempotent, so transient failures are retried.
    fn backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(3)
            .with_jitter()
    }

    fn preference_body<'a>(&self, items: &'a [PreferenceItem], order_id: Uuid) -> PreferenceBody<'a> {
        PreferenceBody {
            items,
            back_urls: BackUrls {
                success: format!("{}/order-confirmation/{}", self.frontend_url, order_id),
                failure: format!("{}/payment/error?orderId={}", self.frontend_url, order_id),
                pending: format!("{}/payment/pending?orderId={}", self.frontend_url, order_id),
            },
            auto_return: "approved",
            external_reference: order_id.to_string(),
            notification_url: format!("{}/api/payments/webhook", self.backend_url),
        }
    }

    fn transport(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Transport(format!("request timed out: {}", err))
        } else {
            GatewayError::Transport(err.to_string())
        }
    }

    async fn rejection(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(200).collect();

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Mercado Pago returned retryable status {}: {}", status, message);
            GatewayError::Transport(format!("HTTP {} - {}", status, message))
        } else {
            error!("Mercado Pago rejected request with {}: {}", status, message);
            GatewayError::Rejected { status: status.as_u16(), message }
        }
    }

    /// Mercado Pago payment ids are numeric. Anything else never reaches
    /// the URL path.
    fn is_payment_id(payment_id: &str) -> bool {
        !payment_id.is_empty() && payment_id.bytes().all(|b| b.is_ascii_digit())
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        let url = format!("{}/v1/payments/{}", self.api_base_url, payment_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.access_token.expose())
            .send()
            .await
            .map_err(Self::transport)?;

        match response.status() {
            status if status.is_success() => {
                let payment = response
                    .json::<Payment>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                if payment.id != payment_id {
                    error!("Lookup for payment {} returned payment {}", payment_id, payment.id);
                    return Err(GatewayError::InvalidResponse(format!(
                        "requested payment {} but received {}",
                        payment_id, payment.id
                    )));
                }
                Ok(payment)
            }
            StatusCode::NOT_FOUND => Err(GatewayError::NotFound(payment_id.to_string())),
            _ => Err(Self::rejection(response).await),
        }
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_preference(
        &self,
        items: &[PreferenceItem],
        order_id: Uuid,
    ) -> Result<PaymentRedirect, GatewayError> {
        let body = self.preference_body(items, order_id);
        let url = format!("{}/checkout/preferences", self.api_base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose())
            .json(&body)
            .send()
            .await
            .map_err(Self::transport)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        debug!("Mercado Pago preference {} created for order {}", preference.id, order_id);

        Ok(PaymentRedirect {
            sandbox_init_point: preference
                .sandbox_init_point
                .unwrap_or_else(|| preference.init_point.clone()),
            init_point: preference.init_point,
            preference_id: preference.id,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Payment, GatewayError> {
        if !Self::is_payment_id(payment_id) {
            warn!("Refusing lookup of malformed payment id {:?}", payment_id);
            return Err(GatewayError::NotFound(payment_id.to_string()));
        }

        (|| async { self.fetch_payment(payment_id).await })
            .retry(Self::backoff())
            .when(|e| matches!(e, GatewayError::Transport(_)))
            .await
    }
}
