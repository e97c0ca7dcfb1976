use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Haat Marketplace API",
        version = "0.3.0",
        description = r#"
# Haat Marketplace API

Checkout, payment, and seller settlement for a regional artisan marketplace.
Customers build a server-priced cart, pay through Razorpay, and sellers are
settled on a schedule with the platform fee already deducted.

## Authentication

Customer and admin endpoints require a JWT in the Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

The webhook endpoint is unauthenticated; it is protected by an HMAC-SHA256
signature over the raw request body instead.

## Money

Every amount in this API is an integer number of paise (INR minor units).
There are no floating-point amounts on the wire.

## Pagination

List endpoints take `page` (default 1) and `per_page` (default 20, max 100)
query parameters.
        "#,
        contact(name = "Haat Platform Team", email = "platform@haat.example"),
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Cart", description = "Shopping cart endpoints"),
        (name = "Checkout", description = "Order creation and payment verification"),
        (name = "Payouts", description = "Seller settlement endpoints (admin)"),
        (name = "Webhooks", description = "Inbound payment gateway notifications"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Cart
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::carts::sync_cart,

        // Checkout
        crate::handlers::checkout::create_order,
        crate::handlers::checkout::verify_payment,
        crate::handlers::checkout::list_orders,
        crate::handlers::checkout::get_order,
        crate::handlers::checkout::cancel_order,
        crate::handlers::checkout::refund_order,

        // Payouts
        crate::handlers::payouts::list_payouts,
        crate::handlers::payouts::get_payout,
        crate::handlers::payouts::run_settlement,

        // Webhooks
        crate::handlers::webhooks::razorpay_webhook,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::handlers::common::PaginatedResponse<serde_json::Value>,

            // Cart types
            crate::entities::cart::Model,
            crate::entities::cart::CartStatus,
            crate::entities::cart_item::Model,
            crate::services::carts::CartView,
            crate::services::carts::SyncLine,
            crate::services::carts::SyncOutcome,
            crate::handlers::carts::AddItemRequest,
            crate::handlers::carts::UpdateQuantityRequest,
            crate::handlers::carts::SyncCartRequest,

            // Checkout types
            crate::entities::order::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order_item::Model,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::VerifyPaymentRequest,
            crate::services::orders::RefundRequest,
            crate::services::orders::CheckoutResponse,
            crate::services::orders::VerificationOutcome,
            crate::services::orders::OrderWithItems,
            crate::services::pricing::OrderTotals,

            // Payout types
            crate::entities::payout::Model,
            crate::entities::payout::PayoutStatus,
            crate::services::payouts::SettlementReport,
            crate::services::payouts::PayoutWithItems,

            // Webhook types
            crate::handlers::webhooks::WebhookAck,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_checkout_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Haat Marketplace API"));
        assert!(json.contains("/api/v1/checkout/create-order"));
        assert!(json.contains("/api/v1/webhooks/razorpay"));
        assert!(json.contains("bearer_auth"));
    }
}
