use std::time::Duration;

use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use crate::PayosError;
use crate::signature::sign_create_request;
use crate::types::{ApiEnvelope, CheckoutSession, PaymentInfo, WebhookData, WebhookPayload};

const DEFAULT_BASE_URL: &str = "https://api-merchant.payos.vn";

/// Retry policy for talking to PayOS: up to 5 attempts with exponential
/// backoff starting at 2s, plus a little jitter.
const RETRY_ATTEMPTS: u32 = 5;
const RETRY_BASE: Duration = Duration::from_secs(2);
const RETRY_CAP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PayosConfig {
    pub client_id: String,
    pub api_key: String,
    pub checksum_key: String,
    /// Override for tests / sandboxing; None means the production endpoint.
    pub base_url: Option<String>,
}

pub struct CreatePaymentArgs<'a> {
    pub order_code: i64,
    pub amount: i64,
    pub description: &'a str,
    pub return_url: &'a str,
    pub cancel_url: &'a str,
}

pub struct PayosClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    api_key: String,
    checksum_key: String,
}

impl PayosClient {
    pub fn new(config: PayosConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            client_id: config.client_id,
            api_key: config.api_key,
            checksum_key: config.checksum_key,
        }
    }

    /// Ask PayOS for a hosted checkout link.
    pub async fn create_payment_link(
        &self,
        args: CreatePaymentArgs<'_>,
    ) -> Result<CheckoutSession, PayosError> {
        let signature = sign_create_request(
            &self.checksum_key,
            args.amount,
            args.cancel_url,
            args.description,
            args.order_code,
            args.return_url,
        );

        let body = json!({
            "orderCode": args.order_code,
            "amount": args.amount,
            "description": args.description,
            "returnUrl": args.return_url,
            "cancelUrl": args.cancel_url,
            "signature": signature,
        });

        let url = format!("{}/v2/payment-requests", self.base_url);
        let resp = self
            .send_with_retry(|| self.with_headers(self.http.post(&url)).json(&body))
            .await?;

        self.unwrap_envelope(resp).await
    }

    /// Poll the state of an order. Used by the client-side confirmation path
    /// (the webhook being the other one).
    pub async fn get_payment_info(&self, order_code: i64) -> Result<PaymentInfo, PayosError> {
        let url = format!("{}/v2/payment-requests/{}", self.base_url, order_code);
        let resp = self
            .send_with_retry(|| self.with_headers(self.http.get(&url)))
            .await?;

        self.unwrap_envelope(resp).await
    }

    /// Verify a webhook body's signature and pull out the fields
    /// reconciliation needs.
    pub fn verify_webhook(&self, payload: &WebhookPayload) -> Result<WebhookData, PayosError> {
        crate::signature::verify_webhook_signature(&self.checksum_key, payload)?;
        let data: WebhookData = serde_json::from_value(payload.data.clone())?;
        Ok(data)
    }

    fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-client-id", &self.client_id)
            .header("x-api-key", &self.api_key)
    }

    async fn unwrap_envelope<T: serde::de::DeserializeOwned>(
        &self,
        resp: Response,
    ) -> Result<T, PayosError> {
        let envelope: ApiEnvelope<T> = resp.json().await?;
        if envelope.code != "00" {
            return Err(PayosError::Api {
                code: envelope.code,
                desc: envelope.desc,
            });
        }
        envelope.data.ok_or(PayosError::MissingData)
    }

    async fn send_with_retry<F>(&self, mut build: F) -> Result<Response, PayosError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut backoff = RETRY_BASE;
        for attempt in 0..RETRY_ATTEMPTS {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if should_retry_status(status) && attempt + 1 < RETRY_ATTEMPTS {
                        warn!("PayOS returned {}, retrying in {:?}", status, backoff);
                        sleep_with_jitter(backoff).await;
                        backoff = backoff.saturating_mul(2).min(RETRY_CAP);
                        continue;
                    }
                    debug!("PayOS responded {} on attempt {}", status, attempt + 1);
                    return Ok(resp);
                }
                Err(e) => {
                    if attempt + 1 >= RETRY_ATTEMPTS {
                        return Err(e.into());
                    }
                    warn!("PayOS request failed ({}), retrying in {:?}", e, backoff);
                    sleep_with_jitter(backoff).await;
                    backoff = backoff.saturating_mul(2).min(RETRY_CAP);
                }
            }
        }
        unreachable!("retry loop should return or error");
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn sleep_with_jitter(base: Duration) {
    let jitter_ms: u64 = rand::rng().random_range(0..=200);
    tokio::time::sleep(base + Duration::from_millis(jitter_ms)).await;
}
