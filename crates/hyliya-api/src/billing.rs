use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use tracing::{error, info, warn};

use hyliya_db::models::InvoiceRow;
use hyliya_db::queries::billing::PaidOutcome;
use hyliya_db::ts;
use hyliya_payos::{CreatePaymentArgs, PaymentStatus, PayosClient, WebhookPayload};
use hyliya_types::api::{Claims, CreatePaymentRequest, CreatePaymentResponse, InvoiceStatusResponse};
use hyliya_types::packages;

use crate::state::AppState;

pub async fn list_packages() -> impl IntoResponse {
    Json(packages::PACKAGES)
}

fn payos_or_unavailable(state: &AppState) -> Result<&PayosClient, StatusCode> {
    state.payos.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

/// Start a premium purchase: ask PayOS for a checkout link and persist the
/// pending invoice.
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let payos = payos_or_unavailable(&state)?;
    let package = packages::find(&req.package_id).ok_or(StatusCode::BAD_REQUEST)?;

    // Order codes are random rather than sequential so they leak nothing;
    // re-roll on the (unlikely) collision.
    let mut order_code = 0i64;
    for _ in 0..5 {
        let candidate = rand::rng().random_range(100_000_000..=999_999_999_999i64);
        if state
            .db
            .get_invoice(candidate)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .is_none()
        {
            order_code = candidate;
            break;
        }
    }
    if order_code == 0 {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let session = payos
        .create_payment_link(CreatePaymentArgs {
            order_code,
            amount: package.amount,
            description: package.name,
            return_url: &state.payment_return_url,
            cancel_url: &state.payment_cancel_url,
        })
        .await
        .map_err(|e| {
            error!("PayOS create_payment_link failed: {}", e);
            StatusCode::BAD_GATEWAY
        })?;

    state
        .db
        .insert_invoice(
            session.order_code,
            &claims.sub.to_string(),
            package.id,
            package.amount,
            &session.checkout_url,
            &ts(chrono::Utc::now()),
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!(
        "{} opened checkout for {} (order {})",
        claims.username, package.id, session.order_code
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            order_code: session.order_code,
            checkout_url: session.checkout_url,
            amount: package.amount,
            status: "pending".into(),
        }),
    ))
}

/// PayOS webhook — one of the two confirmation paths. Public route; trust
/// comes from the HMAC signature, not from auth.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<impl IntoResponse, StatusCode> {
    let payos = payos_or_unavailable(&state)?;

    let data = payos.verify_webhook(&payload).map_err(|e| {
        warn!("Rejected webhook: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    if !payload.success || data.code != "00" {
        info!("Webhook for order {} reports failure, ignoring", data.order_code);
        return Ok(Json(serde_json::json!({ "success": true })));
    }

    apply_paid(&state, data.order_code)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Client-side confirmation path: poll PayOS for the order's state and apply
/// the same idempotent transition the webhook does.
pub async fn payment_status(
    State(state): State<AppState>,
    Path(order_code): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let invoice = fetch_own_invoice(&state, order_code, &claims)?;

    if invoice.status == "pending" {
        let payos = payos_or_unavailable(&state)?;
        match payos.get_payment_info(order_code).await {
            Ok(info) => match info.status {
                PaymentStatus::Paid => apply_paid(&state, order_code)?,
                PaymentStatus::Cancelled | PaymentStatus::Expired => {
                    state
                        .db
                        .mark_cancelled(order_code)
                        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
                }
                PaymentStatus::Pending | PaymentStatus::Processing => {}
            },
            // The provider being briefly unreachable shouldn't fail the
            // poll; report our current view instead.
            Err(e) => warn!("PayOS status poll for {} failed: {}", order_code, e),
        }
    }

    let invoice = fetch_own_invoice(&state, order_code, &claims)?;
    Ok(Json(to_status_response(invoice)))
}

/// User backed out of checkout.
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(order_code): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    fetch_own_invoice(&state, order_code, &claims)?;

    state
        .db
        .mark_cancelled(order_code)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let invoice = fetch_own_invoice(&state, order_code, &claims)?;
    Ok(Json(to_status_response(invoice)))
}

/// The single idempotent "mark paid + grant entitlement" step both
/// confirmation paths converge on.
fn apply_paid(state: &AppState, order_code: i64) -> Result<(), StatusCode> {
    let invoice = state
        .db
        .get_invoice(order_code)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or_else(|| {
            warn!("Confirmation for unknown order {}", order_code);
            StatusCode::NOT_FOUND
        })?;

    let days = packages::find(&invoice.package_id)
        .map(|p| p.days)
        .unwrap_or(30);

    let outcome = state
        .db
        .mark_paid(order_code, days, chrono::Utc::now())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    match outcome {
        PaidOutcome::Applied { premium_expires } => {
            info!(
                "Order {} paid; premium for {} until {}",
                order_code, invoice.user_id, premium_expires
            );
        }
        PaidOutcome::AlreadyPaid => {
            info!("Order {} already applied, duplicate confirmation ignored", order_code);
        }
        PaidOutcome::NotPending { status } => {
            warn!("Confirmation for order {} in state '{}', ignoring", order_code, status);
        }
        PaidOutcome::NotFound => return Err(StatusCode::NOT_FOUND),
    }

    Ok(())
}

fn fetch_own_invoice(
    state: &AppState,
    order_code: i64,
    claims: &Claims,
) -> Result<InvoiceRow, StatusCode> {
    let invoice = state
        .db
        .get_invoice(order_code)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    if invoice.user_id != claims.sub.to_string() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(invoice)
}

fn to_status_response(invoice: InvoiceRow) -> InvoiceStatusResponse {
    InvoiceStatusResponse {
        order_code: invoice.order_code,
        package_id: invoice.package_id,
        amount: invoice.amount,
        status: invoice.status,
        paid_at: invoice.paid_at.as_deref().map(hyliya_db::parse_ts),
    }
}
