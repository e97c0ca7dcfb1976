use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::entities::payout;
use crate::errors::ServiceError;
use crate::handlers::common::{PaginatedResponse, PaginationParams};
use crate::services::payouts::{PayoutWithItems, SettlementReport};
use crate::{ApiResponse, AppState};

/// Routes mounted under `/api/v1/payouts`. Settlement is back-office
/// machinery, so everything here requires the admin role.
pub fn payout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payouts))
        .route("/run", post(run_settlement))
        .route("/{id}", get(get_payout))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayoutFilter {
    /// Restrict to one seller
    pub seller_id: Option<Uuid>,
}

/// List payouts, newest first
#[utoipa::path(
    get,
    path = "/api/v1/payouts",
    params(PayoutFilter, PaginationParams),
    responses(
        (status = 200, description = "Page of payouts", body = crate::ApiResponse<PaginatedResponse<payout::Model>>),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payouts"
)]
pub async fn list_payouts(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<PayoutFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<payout::Model>>>, ServiceError> {
    let (items, total) = state
        .services
        .payouts
        .list_payouts(filter.seller_id, pagination.page(), pagination.per_page())
        .await?;
    let page = PaginatedResponse::new(items, pagination.page(), pagination.per_page(), total);
    Ok(Json(ApiResponse::success(page)))
}

/// Fetch one payout with the order items it settled
#[utoipa::path(
    get,
    path = "/api/v1/payouts/{id}",
    params(("id" = Uuid, Path, description = "Payout id")),
    responses(
        (status = 200, description = "Payout detail", body = crate::ApiResponse<PayoutWithItems>),
        (status = 404, description = "Payout not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payouts"
)]
pub async fn get_payout(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PayoutWithItems>>, ServiceError> {
    let detail = state.services.payouts.get_payout(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Run a settlement sweep immediately instead of waiting for the scheduler
#[utoipa::path(
    post,
    path = "/api/v1/payouts/run",
    responses(
        (status = 200, description = "Settlement summary", body = crate::ApiResponse<SettlementReport>),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payouts"
)]
pub async fn run_settlement(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<SettlementReport>>, ServiceError> {
    let report = state.services.payouts.run_settlement(Utc::now()).await?;
    Ok(Json(ApiResponse::success(report)))
}
