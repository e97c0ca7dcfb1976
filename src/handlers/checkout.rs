use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::entities::order;
use crate::errors::ServiceError;
use crate::handlers::common::{validate_input, PaginatedResponse, PaginationParams};
use crate::services::orders::{
    CheckoutResponse, CreateOrderRequest, OrderWithItems, RefundRequest, VerificationOutcome,
    VerifyPaymentRequest,
};
use crate::{ApiResponse, AppState};

/// Routes mounted under `/api/v1/checkout`.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/verify", post(verify_payment))
        .route("/orders", get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/cancel", post(cancel_order))
        .route("/orders/{id}/refund", post(refund_order))
}

/// Price the active cart and open a gateway order
#[utoipa::path(
    post,
    path = "/api/v1/checkout/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created and ready for payment", body = crate::ApiResponse<CheckoutResponse>),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 422, description = "A cart line exceeds available stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway rejected the order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutResponse>>), ServiceError> {
    validate_input(&payload)?;
    let checkout = state.services.orders.create_order(user.id, payload).await?;
    let status = if checkout.idempotent_replay {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(ApiResponse::success(checkout))))
}

/// Verify a completed payment's signature and capture it
#[utoipa::path(
    post,
    path = "/api/v1/checkout/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Verification outcome; `verified` is false on signature mismatch", body = crate::ApiResponse<VerificationOutcome>),
        (status = 404, description = "No order for that gateway id", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid with a different payment", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<VerificationOutcome>>, ServiceError> {
    validate_input(&payload)?;
    let outcome = state.services.orders.verify_payment(user.id, payload).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// List the customer's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/checkout/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Page of orders", body = crate::ApiResponse<PaginatedResponse<order::Model>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<order::Model>>>, ServiceError> {
    let (items, total) = state
        .services
        .orders
        .list_orders(user.id, params.page(), params.per_page())
        .await?;
    let page = PaginatedResponse::new(items, params.page(), params.per_page(), total);
    Ok(Json(ApiResponse::success(page)))
}

/// Fetch one order with its line items
#[utoipa::path(
    get,
    path = "/api/v1/checkout/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail", body = crate::ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderWithItems>>, ServiceError> {
    let detail = state.services.orders.get_order(user.id, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Cancel an order that has not been paid
#[utoipa::path(
    post,
    path = "/api/v1/checkout/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Cancelled order", body = crate::ApiResponse<order::Model>),
        (status = 400, description = "Order is paid or already cancelled", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state.services.orders.cancel_order(user.id, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Refund a paid order through the gateway (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/checkout/orders/{id}/refund",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refunded order", body = crate::ApiResponse<order::Model>),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already refunded", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn refund_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefundRequest>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    validate_input(&payload)?;
    let order = state.services.orders.refund_order(id, payload).await?;
    Ok(Json(ApiResponse::success(order)))
}
