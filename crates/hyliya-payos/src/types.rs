use serde::{Deserialize, Serialize};

/// Payment state as PayOS reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Cancelled,
    Expired,
}

/// Data block returned when a payment link is created.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub order_code: i64,
    pub checkout_url: String,
    #[serde(default)]
    pub qr_code: Option<String>,
}

/// Data block returned by the status-poll endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub id: String,
    pub order_code: i64,
    pub amount: i64,
    pub amount_paid: i64,
    pub status: PaymentStatus,
}

/// Raw webhook body. `data` stays untyped until the signature over it has
/// been verified.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub code: String,
    pub desc: String,
    pub success: bool,
    pub data: serde_json::Value,
    pub signature: String,
}

/// The fields of a verified webhook the reconciliation flow needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    pub order_code: i64,
    pub amount: i64,
    /// PayOS transaction result code; "00" is success.
    pub code: String,
}

/// Envelope wrapping every PayOS API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub code: String,
    pub desc: String,
    pub data: Option<T>,
}
