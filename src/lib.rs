use axum::{
    http::{HeaderValue, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod state;

use state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Origine CORS ignorée: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

/// Construit le routeur complet de l'API.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/api/health", get(routes::health::health))
        // Catalogue
        .route(
            "/api/products",
            get(routes::products::list_products).post(routes::products::create_product),
        )
        .route(
            "/api/products/:id",
            get(routes::products::get_product)
                .put(routes::products::update_product)
                .delete(routes::products::delete_product),
        )
        .route("/api/products/:id/stock", put(routes::products::update_stock))
        // Panier
        .route("/api/cart", get(routes::cart::view_cart))
        .route("/api/cart/add", post(routes::cart::add_to_cart))
        .route("/api/cart/update/:item_id", put(routes::cart::update_cart_item))
        .route(
            "/api/cart/remove/:item_id",
            delete(routes::cart::remove_cart_item),
        )
        .route("/api/cart/clear", delete(routes::cart::clear_cart))
        .route("/api/cart/checkout", post(routes::cart::checkout))
        // Commandes
        .route(
            "/api/orders",
            get(routes::orders::list_orders).post(routes::orders::create_order),
        )
        .route("/api/orders/my", get(routes::orders::my_orders))
        .route("/api/orders/stats/summary", get(routes::orders::order_stats))
        .route("/api/orders/:id", get(routes::orders::get_order))
        .route("/api/orders/:id/status", put(routes::orders::update_order_status))
        .route("/api/orders/:id/cancel", put(routes::orders::cancel_order))
        // Avis
        .route(
            "/api/reviews",
            get(routes::reviews::list_reviews).post(routes::reviews::create_review),
        )
        .route("/api/reviews/my", get(routes::reviews::my_reviews))
        .route(
            "/api/reviews/:id",
            get(routes::reviews::get_review)
                .put(routes::reviews::update_review)
                .delete(routes::reviews::delete_review),
        )
        .route("/api/reviews/:id/helpful", put(routes::reviews::mark_helpful))
        .route("/api/reviews/:id/report", put(routes::reviews::toggle_report))
        // Utilisateurs
        .route("/api/users", get(routes::users::list_users))
        .route(
            "/api/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/api/users/:id/details", get(routes::users::user_details))
        .route(
            "/api/users/:id/toggle-status",
            put(routes::users::toggle_user_status),
        )
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Route not found" })),
            )
        })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
