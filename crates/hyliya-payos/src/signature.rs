use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::PayosError;
use crate::types::WebhookPayload;

type HmacSha256 = Hmac<Sha256>;

/// Render a JSON object as PayOS's canonical signing string: keys sorted
/// alphabetically, joined as `k=v&k=v`. Nulls render empty, strings render
/// raw, everything else renders as its JSON text.
pub(crate) fn canonical_string(data: &serde_json::Value) -> String {
    let Some(map) = data.as_object() else {
        return String::new();
    };

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    keys.iter()
        .map(|k| {
            let v = &map[*k];
            let rendered = match v {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{k}={rendered}")
        })
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn hmac_hex(checksum_key: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(checksum_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Signature for a create-payment-link request. PayOS signs exactly these
/// five fields, in this order.
pub(crate) fn sign_create_request(
    checksum_key: &str,
    amount: i64,
    cancel_url: &str,
    description: &str,
    order_code: i64,
    return_url: &str,
) -> String {
    let payload = format!(
        "amount={amount}&cancelUrl={cancel_url}&description={description}&orderCode={order_code}&returnUrl={return_url}"
    );
    hmac_hex(checksum_key, &payload)
}

/// Check a webhook body's HMAC over its `data` object.
pub fn verify_webhook_signature(
    checksum_key: &str,
    payload: &WebhookPayload,
) -> Result<(), PayosError> {
    let expected =
        hex::decode(&payload.signature).map_err(|_| PayosError::BadSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(checksum_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical_string(&payload.data).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| PayosError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: &str = "test-checksum-key";

    #[test]
    fn canonical_string_sorts_and_renders() {
        let data = json!({
            "orderCode": 12345,
            "amount": 79000,
            "description": "Premium 1 tháng",
            "counterAccountName": null,
        });
        assert_eq!(
            canonical_string(&data),
            "amount=79000&counterAccountName=&description=Premium 1 tháng&orderCode=12345"
        );
    }

    #[test]
    fn webhook_roundtrip_verifies() {
        let data = json!({ "orderCode": 12345, "amount": 79000, "code": "00" });
        let payload = WebhookPayload {
            code: "00".into(),
            desc: "success".into(),
            success: true,
            signature: hmac_hex(KEY, &canonical_string(&data)),
            data,
        };

        assert!(verify_webhook_signature(KEY, &payload).is_ok());
    }

    #[test]
    fn tampered_data_is_rejected() {
        let data = json!({ "orderCode": 12345, "amount": 79000 });
        let mut payload = WebhookPayload {
            code: "00".into(),
            desc: "success".into(),
            success: true,
            signature: hmac_hex(KEY, &canonical_string(&data)),
            data,
        };
        payload.data["amount"] = json!(1);

        assert!(matches!(
            verify_webhook_signature(KEY, &payload),
            Err(PayosError::BadSignature)
        ));
    }

    #[test]
    fn garbage_signature_is_rejected() {
        let data = json!({ "orderCode": 1 });
        let payload = WebhookPayload {
            code: "00".into(),
            desc: "success".into(),
            success: true,
            signature: "not-hex".into(),
            data,
        };
        assert!(verify_webhook_signature(KEY, &payload).is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let data = json!({ "orderCode": 1 });
        let payload = WebhookPayload {
            code: "00".into(),
            desc: "success".into(),
            success: true,
            signature: hmac_hex("other-key", &canonical_string(&data)),
            data,
        };
        assert!(verify_webhook_signature(KEY, &payload).is_err());
    }
}
