// Tests HTTP de bout en bout sur le routeur complet

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::net::{IpAddr, Ipv4Addr};

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use jsonwebtoken::{encode, EncodingKey, Header};
    use ruststore::auth::Claims;
    use ruststore::config::{Config, LogFormat};
    use ruststore::models::*;
    use ruststore::state::AppState;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "test_secret";

    fn create_test_state() -> AppState {
        let config = Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            jwt_secret: SECRET.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            seed_demo_data: false,
            cors_origins: vec![],
        };
        AppState::new(config)
    }

    fn token_for(user_id: Uuid) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            iat: chrono::Utc::now().timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn add_user(state: &AppState, name: &str, role: Role) -> (User, String) {
        let user = User::new(name, &format!("{name}@test.local"), "Test", "User", role);
        state.insert_user(user.clone());
        let token = token_for(user.id);
        (user, token)
    }

    fn add_product(state: &AppState, name: &str, price: i64, stock: u32) -> Uuid {
        let req = ProductRequest {
            name: name.to_string(),
            description: "A test product".to_string(),
            price,
            category: Category::Electronics,
            brand: "Test".to_string(),
            stock,
            images: vec![],
            specifications: BTreeMap::new(),
            weight: None,
            dimensions: None,
            tags: vec![],
        };
        state.insert_product(Product::new(req, Uuid::new_v4()))
    }

    fn order_details() -> Value {
        let address = json!({
            "street": "1 rue du Crabe",
            "city": "Paris",
            "postal_code": "75001",
            "country": "FR"
        });
        json!({
            "shipping_address": address,
            "billing_address": address,
            "payment_method": "credit_card"
        })
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = ruststore::build_router(create_test_state());

        let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
    }

    #[tokio::test]
    async fn test_unknown_route_returns_json_404() {
        let app = ruststore::build_router(create_test_state());

        let (status, body) = send(&app, Method::GET, "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let state = create_test_state();
        let app = ruststore::build_router(state.clone());

        let (status, body) = send(&app, Method::GET, "/api/cart", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "No token, authorization denied");

        let (status, body) = send(&app, Method::GET, "/api/cart", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token is not valid");

        // Jeton valide pour un utilisateur inconnu
        let token = token_for(Uuid::new_v4());
        let (status, _) = send(&app, Method::GET, "/api/cart", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deactivated_account_rejected() {
        let state = create_test_state();
        let (user, token) = add_user(&state, "sleepy", Role::User);
        state.users.get_mut(&user.id).unwrap().is_active = false;
        let app = ruststore::build_router(state);

        let (status, body) = send(&app, Method::GET, "/api/cart", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Account is deactivated");
    }

    #[tokio::test]
    async fn test_product_creation_requires_admin_and_valid_body() {
        let state = create_test_state();
        let (_user, user_token) = add_user(&state, "alice", Role::User);
        let (_admin, admin_token) = add_user(&state, "root", Role::Admin);
        let app = ruststore::build_router(state.clone());

        let payload = json!({
            "name": "Keyboard",
            "description": "Mechanical keyboard",
            "price": 8900,
            "category": "electronics",
            "brand": "Ferris",
            "stock": 5
        });

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&user_token),
            Some(payload.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let invalid = json!({
            "name": "",
            "description": "Mechanical keyboard",
            "price": -5,
            "category": "electronics",
            "brand": "Ferris",
            "stock": 5
        });
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&admin_token),
            Some(invalid),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["field"].as_str())
            .collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"price"));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&admin_token),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["product"]["name"], "Keyboard");
        assert_eq!(state.products.len(), 1);
    }

    #[tokio::test]
    async fn test_list_products_hides_inactive() {
        let state = create_test_state();
        add_product(&state, "Visible", 1000, 3);
        let hidden = add_product(&state, "Hidden", 1000, 3);
        state.products.get_mut(&hidden).unwrap().is_active = false;
        let app = ruststore::build_router(state);

        let (status, body) = send(&app, Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["products"].as_array().unwrap().len(), 1);
        assert_eq!(body["products"][0]["name"], "Visible");
        assert_eq!(body["pagination"]["total_items"], 1);

        let uri = format!("/api/products/{hidden}");
        let (status, _) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cart_to_order_flow() {
        let state = create_test_state();
        let (user, token) = add_user(&state, "alice", Role::User);
        let product = add_product(&state, "Headphones", 12900, 4);
        let app = ruststore::build_router(state.clone());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/cart/add",
            Some(&token),
            Some(json!({ "product_id": product, "quantity": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"]["total_amount"], 25800);
        assert_eq!(body["cart"]["total_items"], 2);

        // Au-delà du stock disponible
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/cart/add",
            Some(&token),
            Some(json!({ "product_id": product, "quantity": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cannot add more items. Only 4 available in stock");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/cart/checkout",
            Some(&token),
            Some(order_details()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["order"]["status"], "pending");
        assert_eq!(body["order"]["total_amount"], 25800);
        assert_eq!(state.products.get(&product).unwrap().stock, 2);
        assert!(state.carts.get(&user.id).unwrap().items.is_empty());

        // Panier vide
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/cart/checkout",
            Some(&token),
            Some(order_details()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cart is empty");
    }

    #[tokio::test]
    async fn test_checkout_reports_shortfall() {
        let state = create_test_state();
        let (_user, token) = add_user(&state, "bob", Role::User);
        let product = add_product(&state, "Book", 3990, 5);
        let app = ruststore::build_router(state.clone());

        send(
            &app,
            Method::POST,
            "/api/cart/add",
            Some(&token),
            Some(json!({ "product_id": product, "quantity": 4 })),
        )
        .await;

        // Quelqu'un d'autre a acheté entre-temps
        state.products.get_mut(&product).unwrap().stock = 1;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/cart/checkout",
            Some(&token),
            Some(order_details()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["available"], 1);
        assert_eq!(body["requested"], 4);
        assert_eq!(body["shortfall"], 3);
        assert_eq!(state.products.get(&product).unwrap().stock, 1);
        assert_eq!(state.orders.len(), 0);
    }

    #[tokio::test]
    async fn test_cancel_via_api_restores_stock() {
        let state = create_test_state();
        let (_owner, owner_token) = add_user(&state, "carol", Role::User);
        let (_other, other_token) = add_user(&state, "dave", Role::User);
        let product = add_product(&state, "Cap", 2500, 10);
        let app = ruststore::build_router(state.clone());

        let mut payload = order_details();
        payload["items"] = json!([{ "product_id": product, "quantity": 3 }]);
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/orders",
            Some(&owner_token),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let order_id = body["order"]["id"].as_str().unwrap().to_string();
        assert_eq!(state.products.get(&product).unwrap().stock, 7);

        let uri = format!("/api/orders/{order_id}");
        let (status, _) = send(&app, Method::GET, &uri, Some(&other_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let cancel_uri = format!("/api/orders/{order_id}/cancel");
        let (status, body) = send(&app, Method::PUT, &cancel_uri, Some(&owner_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["status"], "cancelled");
        assert_eq!(state.products.get(&product).unwrap().stock, 10);

        let (status, _) = send(&app, Method::PUT, &cancel_uri, Some(&owner_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.products.get(&product).unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_admin_status_update_and_stats() {
        let state = create_test_state();
        let (_user, user_token) = add_user(&state, "erin", Role::User);
        let (_admin, admin_token) = add_user(&state, "root", Role::Admin);
        let product = add_product(&state, "Cap", 2500, 10);
        let app = ruststore::build_router(state.clone());

        let mut payload = order_details();
        payload["items"] = json!([{ "product_id": product, "quantity": 2 }]);
        let (_, body) = send(&app, Method::POST, "/api/orders", Some(&user_token), Some(payload)).await;
        let order_id = body["order"]["id"].as_str().unwrap().to_string();

        let status_uri = format!("/api/orders/{order_id}/status");
        let (status, _) = send(
            &app,
            Method::PUT,
            &status_uri,
            Some(&user_token),
            Some(json!({ "status": "shipped" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            Method::PUT,
            &status_uri,
            Some(&admin_token),
            Some(json!({ "status": "shipped", "tracking_number": "TRK-42" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["tracking_number"], "TRK-42");

        let (status, body) =
            send(&app, Method::GET, "/api/orders/stats/summary", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_orders"], 1);
        assert_eq!(body["total_revenue"], 5000);

        let (status, body) = send(
            &app,
            Method::PUT,
            &status_uri,
            Some(&admin_token),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order"]["status"], "cancelled");
        assert_eq!(state.products.get(&product).unwrap().stock, 10);

        let (status, _) = send(
            &app,
            Method::PUT,
            &status_uri,
            Some(&admin_token),
            Some(json!({ "status": "pending" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_one_review_per_product_and_user() {
        let state = create_test_state();
        let (_user, token) = add_user(&state, "frank", Role::User);
        let product = add_product(&state, "Book", 3990, 5);
        let app = ruststore::build_router(state.clone());

        let review = json!({
            "product_id": product,
            "rating": 5,
            "title": "Great",
            "comment": "Loved every page"
        });

        let (status, body) =
            send(&app, Method::POST, "/api/reviews", Some(&token), Some(review.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["review"]["verified"], false);

        let (status, body) =
            send(&app, Method::POST, "/api/reviews", Some(&token), Some(review)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "You have already reviewed this product");

        let uri = format!("/api/reviews?product_id={product}");
        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rating_stats"]["total_reviews"], 1);
        assert_eq!(body["rating_stats"]["average_rating"], 5.0);
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let state = create_test_state();
        let (admin, admin_token) = add_user(&state, "root", Role::Admin);
        let (user, _) = add_user(&state, "gone", Role::User);
        let app = ruststore::build_router(state.clone());

        let uri = format!("/api/users/{}", admin.id);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/users/{}", user.id);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!state.users.contains_key(&user.id));
    }

    #[tokio::test]
    async fn test_update_user_rejects_taken_username() {
        let state = create_test_state();
        let (user, token) = add_user(&state, "grace", Role::User);
        add_user(&state, "henry", Role::User);
        let app = ruststore::build_router(state);

        let uri = format!("/api/users/{}", user.id);
        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "username": "henry" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "This username is already taken");

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "username": "bad name!" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "username");
    }

    #[tokio::test]
    async fn test_renamed_username_is_released() {
        let state = create_test_state();
        let (grace, grace_token) = add_user(&state, "grace", Role::User);
        let (henry, henry_token) = add_user(&state, "henry", Role::User);
        let app = ruststore::build_router(state.clone());

        let uri = format!("/api/users/{}", grace.id);
        let (status, _) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&grace_token),
            Some(json!({ "username": "gina", "email": "GINA@test.local" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.users.get(&grace.id).unwrap().email, "gina@test.local");

        let uri = format!("/api/users/{}", henry.id);
        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&henry_token),
            Some(json!({ "username": "grace" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "grace");

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&henry_token),
            Some(json!({ "email": "gina@test.local" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "This email is already taken");
    }

    #[tokio::test]
    async fn test_concurrent_renames_to_same_username() {
        let state = create_test_state();
        let mut tasks = vec![];
        for i in 0..8 {
            let (user, token) = add_user(&state, &format!("user{i}"), Role::User);
            let app = ruststore::build_router(state.clone());
            tasks.push(tokio::spawn(async move {
                let uri = format!("/api/users/{}", user.id);
                let (status, _) = send(
                    &app,
                    Method::PUT,
                    &uri,
                    Some(&token),
                    Some(json!({ "username": "neo" })),
                )
                .await;
                status
            }));
        }

        let mut statuses = vec![];
        for task in tasks {
            statuses.push(task.await.unwrap());
        }

        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
        assert_eq!(
            statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(),
            7
        );
        let holders = state
            .users
            .iter()
            .filter(|u| u.value().username == "neo")
            .count();
        assert_eq!(holders, 1);
    }

    #[tokio::test]
    async fn test_blank_names_rejected_after_trim() {
        let state = create_test_state();
        let (user, token) = add_user(&state, "ivy", Role::User);
        let app = ruststore::build_router(state.clone());

        let uri = format!("/api/users/{}", user.id);
        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "first_name": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "first_name");
        assert_eq!(state.users.get(&user.id).unwrap().first_name, "Test");

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "first_name": "  Ivy  " })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["first_name"], "Ivy");
    }

    #[tokio::test]
    async fn test_view_cart_prunes_and_warns() {
        let state = create_test_state();
        let (_user, token) = add_user(&state, "jack", Role::User);
        let kept = add_product(&state, "Kept", 1000, 5);
        let dropped = add_product(&state, "Dropped", 2000, 5);
        let app = ruststore::build_router(state.clone());

        for product in [kept, dropped] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/cart/add",
                Some(&token),
                Some(json!({ "product_id": product, "quantity": 2 })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        state.products.get_mut(&dropped).unwrap().is_active = false;
        state.products.get_mut(&kept).unwrap().stock = 1;

        let (status, body) = send(&app, Method::GET, "/api/cart", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let items = body["cart"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["product_id"], kept.to_string());
        assert_eq!(body["cart"]["total_amount"], 2000);

        let warnings = body["stock_warnings"].as_array().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0], "Kept: requested 2, available 1");
    }

    #[tokio::test]
    async fn test_review_verified_after_shipping() {
        let state = create_test_state();
        let (_buyer, buyer_token) = add_user(&state, "kate", Role::User);
        let (_admin, admin_token) = add_user(&state, "root", Role::Admin);
        let product = add_product(&state, "Lamp", 4500, 3);
        let app = ruststore::build_router(state.clone());

        let mut payload = order_details();
        payload["items"] = json!([{ "product_id": product, "quantity": 1 }]);
        let (status, body) =
            send(&app, Method::POST, "/api/orders", Some(&buyer_token), Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        let order_id = body["order"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/orders/{order_id}/status"),
            Some(&admin_token),
            Some(json!({ "status": "shipped" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/reviews",
            Some(&buyer_token),
            Some(json!({
                "product_id": product,
                "rating": 4,
                "title": "Bright",
                "comment": "Lights the whole room"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["review"]["verified"], true);
    }

    #[tokio::test]
    async fn test_malformed_id_is_json_400() {
        let state = create_test_state();
        let (_user, token) = add_user(&state, "leo", Role::User);
        let app = ruststore::build_router(state);

        let (status, body) = send(&app, Method::GET, "/api/products/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid ID");

        let (status, body) =
            send(&app, Method::PUT, "/api/orders/42/cancel", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid ID");
    }

    #[tokio::test]
    async fn test_huge_page_number_is_served() {
        let state = create_test_state();
        add_product(&state, "Only", 1000, 1);
        let app = ruststore::build_router(state);

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/products?page=9223372036854775807",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["products"].as_array().unwrap().is_empty());
        assert_eq!(body["pagination"]["has_next"], false);
    }

    #[tokio::test]
    async fn test_price_upper_bound() {
        let state = create_test_state();
        let (_admin, admin_token) = add_user(&state, "root", Role::Admin);
        let app = ruststore::build_router(state);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/products",
            Some(&admin_token),
            Some(json!({
                "name": "Yacht",
                "description": "Too expensive",
                "price": 100_000_001i64,
                "category": "other",
                "brand": "Ferris",
                "stock": 1
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "price");
    }
}
