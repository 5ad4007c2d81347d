use crate::{config::Config, errors::AppError};
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Payment gateway client. The gateway is a black box from the core's
/// perspective: we open a checkout session here and learn the outcome
/// later through the webhook, possibly more than once.
#[derive(Clone)]
pub struct GatewayService {
    client: Client,
    config: Arc<Config>,
}

// ─── Gateway auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GatewayAuthResponse {
    #[serde(rename = "requestSuccessful")]
    request_successful: bool,
    #[serde(rename = "responseBody")]
    response_body: Option<GatewayTokenBody>,
    #[serde(rename = "responseMessage")]
    response_message: String,
}

#[derive(Debug, Deserialize)]
struct GatewayTokenBody {
    #[serde(rename = "accessToken")]
    access_token: String,
}

// ─── Checkout session ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InitCheckoutRequest {
    amount: f64,
    #[serde(rename = "customerName")]
    customer_name: String,
    #[serde(rename = "customerEmail")]
    customer_email: String,
    #[serde(rename = "paymentReference")]
    payment_reference: String,
    #[serde(rename = "paymentDescription")]
    payment_description: String,
    #[serde(rename = "currencyCode")]
    currency_code: String,
    #[serde(rename = "paymentMethods")]
    payment_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct InitCheckoutResponse {
    #[serde(rename = "requestSuccessful")]
    pub request_successful: bool,
    #[serde(rename = "responseBody")]
    pub response_body: Option<CheckoutBody>,
    #[serde(rename = "responseMessage")]
    pub response_message: String,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    #[serde(rename = "checkoutUrl")]
    pub checkout_url: String,
    #[serde(rename = "paymentReference")]
    pub payment_reference: String,
}

impl GatewayService {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Authenticate with the gateway and get a bearer token
    async fn get_access_token(&self) -> Result<String, AppError> {
        let credentials = format!(
            "{}:{}",
            self.config.gateway_api_key, self.config.gateway_secret_key
        );
        let encoded = general_purpose::STANDARD.encode(credentials);

        let url = format!("{}/api/v1/auth/login", self.config.gateway_base_url);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", encoded))
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        let auth: GatewayAuthResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        if !auth.request_successful {
            return Err(AppError::Gateway(format!(
                "Auth failed: {}",
                auth.response_message
            )));
        }

        auth.response_body
            .map(|b| b.access_token)
            .ok_or_else(|| AppError::Gateway("No access token in response".to_string()))
    }

    /// Open a checkout session for an invoice payment. The charge is
    /// confirmed (or not) later via the webhook carrying the same
    /// payment reference.
    pub async fn create_checkout(
        &self,
        amount: Decimal,
        customer_name: &str,
        customer_email: &str,
        reference: &str,
        description: &str,
    ) -> Result<CheckoutBody, AppError> {
        let token = self.get_access_token().await?;
        let url = format!(
            "{}/api/v1/merchant/transactions/init-transaction",
            self.config.gateway_base_url
        );

        let payload = InitCheckoutRequest {
            amount: amount.try_into().unwrap_or(0.0),
            customer_name: customer_name.to_string(),
            customer_email: customer_email.to_string(),
            payment_reference: reference.to_string(),
            payment_description: description.to_string(),
            currency_code: "AUD".to_string(),
            payment_methods: vec!["CARD".to_string(), "ACCOUNT_TRANSFER".to_string()],
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        let result: InitCheckoutResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        if !result.request_successful {
            return Err(AppError::Gateway(result.response_message));
        }

        result
            .response_body
            .ok_or_else(|| AppError::Gateway("No checkout body in response".to_string()))
    }
}
