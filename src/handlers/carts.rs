use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::validate_input;
use crate::services::carts::{CartView, SyncLine, SyncOutcome};
use crate::{ApiResponse, AppState};

/// Routes mounted under `/api/v1/cart`. Every endpoint acts on the
/// authenticated customer's active cart.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            axum::routing::get(get_cart).delete(clear_cart),
        )
        .route("/items", post(add_item))
        .route("/items/{item_id}", put(update_item).delete(remove_item))
        .route("/sync", post(sync_cart))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100, message = "Quantity must be between 1 and 100"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    /// Zero removes the line
    #[validate(range(min = 0, max = 100, message = "Quantity must be between 0 and 100"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SyncCartRequest {
    #[validate(length(max = 100, message = "A cart can hold at most 100 lines"))]
    pub items: Vec<SyncLine>,
}

/// Fetch the active cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Active cart with items", body = crate::ApiResponse<CartView>),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let view = state.services.carts.get_cart(user.id).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Add a product to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = crate::ApiResponse<CartView>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Product out of stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    validate_input(&payload)?;
    let view = state
        .services
        .carts
        .add_item(user.id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Change a line's quantity (0 removes it)
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Updated cart", body = crate::ApiResponse<CartView>),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    validate_input(&payload)?;
    let view = state
        .services
        .carts
        .update_item_quantity(user.id, item_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Remove a line from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Updated cart", body = crate::ApiResponse<CartView>),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let view = state.services.carts.remove_item(user.id, item_id).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Empty the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Emptied cart", body = crate::ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let view = state.services.carts.clear_cart(user.id).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Replace the cart with a client snapshot, re-priced server-side
#[utoipa::path(
    post,
    path = "/api/v1/cart/sync",
    request_body = SyncCartRequest,
    responses(
        (status = 200, description = "Rebuilt cart and any dropped products", body = crate::ApiResponse<SyncOutcome>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn sync_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SyncCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SyncOutcome>>), ServiceError> {
    validate_input(&payload)?;
    let outcome = state.services.carts.sync(user.id, payload.items).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(outcome))))
}
