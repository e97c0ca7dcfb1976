use axum::{
    body::Bytes,
    extract::{Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::webhook_event::{self, Entity as WebhookEvent};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::services::orders::is_unique_violation;
use crate::{ApiResponse, AppState};

/// Routes mounted under `/api/v1/webhooks`. Unauthenticated; trust comes
/// from the HMAC signature over the raw request body.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/razorpay", post(razorpay_webhook))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub event_type: String,
    /// True when this delivery was already processed and skipped
    pub duplicate: bool,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    payment: Option<EntityWrapper<PaymentEntity>>,
    refund: Option<EntityWrapper<RefundEntity>>,
}

#[derive(Debug, Deserialize)]
struct EntityWrapper<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundEntity {
    id: String,
    payment_id: String,
}

enum Recorded {
    Fresh(webhook_event::Model),
    Retry(webhook_event::Model),
    AlreadyProcessed,
}

/// Receive a Razorpay webhook delivery
///
/// Deliveries are recorded before they are acted on, keyed by the gateway's
/// event id, so redelivered events are acknowledged without reprocessing. A
/// delivery that fails mid-processing keeps its record open and returns a
/// non-2xx status, which makes the gateway retry it.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/razorpay",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted", body = crate::ApiResponse<WebhookAck>),
        (status = 400, description = "Missing or mismatched signature, or malformed payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ServiceError> {
    let signature = headers
        .get("x-razorpay-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServiceError::BadRequest("Missing X-Razorpay-Signature header".to_string())
        })?;
    if !state.verifier.verify_webhook_signature(&body, signature) {
        warn!("Webhook signature verification failed");
        return Err(ServiceError::InvalidSignature);
    }

    let event_id = headers
        .get("x-razorpay-event-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| hex::encode(Sha256::digest(&body)));

    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("Malformed webhook payload: {}", e)))?;
    let raw: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

    let record = match record_delivery(&state.db, &event_id, &envelope.event, raw).await? {
        Recorded::AlreadyProcessed => {
            info!(event_id = %event_id, "Skipping already-processed webhook delivery");
            return Ok(Json(ApiResponse::success(WebhookAck {
                event_type: envelope.event,
                duplicate: true,
            })));
        }
        Recorded::Retry(row) => {
            info!(event_id = %event_id, "Retrying webhook delivery that previously failed");
            row
        }
        Recorded::Fresh(row) => row,
    };

    match dispatch(&state, &envelope).await {
        Ok(()) => {
            let mut row: webhook_event::ActiveModel = record.into();
            row.processed_at = Set(Some(Utc::now()));
            row.error = Set(None);
            row.update(&*state.db).await?;
            state
                .event_sender
                .send_or_log(Event::WebhookProcessed {
                    event_type: envelope.event.clone(),
                    received_at: Utc::now(),
                })
                .await;
            Ok(Json(ApiResponse::success(WebhookAck {
                event_type: envelope.event,
                duplicate: false,
            })))
        }
        Err(err) => {
            warn!(event_id = %event_id, error = %err, "Webhook processing failed");
            let mut row: webhook_event::ActiveModel = record.into();
            row.error = Set(Some(err.to_string()));
            row.update(&*state.db).await?;
            Err(err)
        }
    }
}

async fn dispatch(state: &AppState, envelope: &WebhookEnvelope) -> Result<(), ServiceError> {
    match envelope.event.as_str() {
        "payment.captured" => {
            let payment = require_payment(envelope)?;
            let order_id = payment.order_id.as_deref().ok_or_else(|| {
                ServiceError::BadRequest("payment.captured without an order id".to_string())
            })?;
            state
                .services
                .orders
                .confirm_captured(order_id, &payment.id)
                .await?;
        }
        "payment.failed" => {
            let payment = require_payment(envelope)?;
            let order_id = payment.order_id.as_deref().ok_or_else(|| {
                ServiceError::BadRequest("payment.failed without an order id".to_string())
            })?;
            let reason = payment
                .error_description
                .as_deref()
                .unwrap_or("Payment failed at gateway");
            state
                .services
                .orders
                .mark_payment_failed(order_id, reason)
                .await?;
        }
        "refund.processed" => {
            let refund = envelope.payload.refund.as_ref().ok_or_else(|| {
                ServiceError::BadRequest("refund.processed without a refund entity".to_string())
            })?;
            state
                .services
                .orders
                .record_refund(&refund.entity.payment_id, &refund.entity.id)
                .await?;
        }
        other => {
            debug!("Ignoring webhook event type: {}", other);
        }
    }
    Ok(())
}

fn require_payment(envelope: &WebhookEnvelope) -> Result<&PaymentEntity, ServiceError> {
    envelope
        .payload
        .payment
        .as_ref()
        .map(|w| &w.entity)
        .ok_or_else(|| {
            ServiceError::BadRequest(format!("{} without a payment entity", envelope.event))
        })
}

/// Insert the delivery, falling back to the stored row when the gateway
/// redelivers an event id we have already seen.
async fn record_delivery(
    db: &DatabaseConnection,
    event_id: &str,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<Recorded, ServiceError> {
    let row = webhook_event::ActiveModel {
        id: Set(Uuid::new_v4()),
        event_id: Set(event_id.to_owned()),
        event_type: Set(event_type.to_owned()),
        payload: Set(payload),
        error: Set(None),
        processed_at: Set(None),
        received_at: Set(Utc::now()),
    };
    match row.insert(db).await {
        Ok(model) => Ok(Recorded::Fresh(model)),
        Err(err) if is_unique_violation(&err) => {
            let existing = WebhookEvent::find()
                .filter(webhook_event::Column::EventId.eq(event_id))
                .one(db)
                .await?
                .ok_or_else(|| {
                    DbErr::RecordNotFound(format!("webhook event {} after duplicate insert", event_id))
                })?;
            if existing.processed_at.is_some() {
                Ok(Recorded::AlreadyProcessed)
            } else {
                Ok(Recorded::Retry(existing))
            }
        }
        Err(err) => Err(err.into()),
    }
}
