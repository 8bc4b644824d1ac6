//! Client for the PayOS checkout API: payment-link creation, status
//! polling, and webhook signature verification. The service treats PayOS as
//! an external collaborator; this crate is the only place that talks to it.

mod client;
mod signature;
mod types;

pub use client::{CreatePaymentArgs, PayosClient, PayosConfig};
pub use signature::verify_webhook_signature;
pub use types::{CheckoutSession, PaymentInfo, PaymentStatus, WebhookData, WebhookPayload};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayosError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PayOS rejected the request: {code} {desc}")]
    Api { code: String, desc: String },

    #[error("webhook signature mismatch")]
    BadSignature,

    #[error("response carried no data payload")]
    MissingData,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
