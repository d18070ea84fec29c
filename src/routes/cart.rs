// Routes pour la gestion du panier et le checkout

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::extract::{ValidJson, ValidPath};
use crate::models::*;
use crate::services::order_service;
use crate::state::AppState;

// Panier valorisé pour l'affichage
struct CartCalculation {
    lines: Vec<Value>,
    total: i64,
    stock_warnings: Vec<String>,
}

/// Retire les lignes dont le produit a disparu ou a été désactivé, puis
/// valorise le reste au prix enregistré dans le panier.
fn prune_and_price(cart: &mut Cart, products: &DashMap<Uuid, Product>) -> CartCalculation {
    let before = cart.items.len();
    cart.items.retain(|item| {
        products
            .get(&item.product_id)
            .map_or(false, |p| p.is_active)
    });
    if cart.items.len() != before {
        cart.updated_at = Utc::now();
        tracing::info!(
            "Panier {}: {} ligne(s) retirée(s) (produits indisponibles)",
            cart.user_id,
            before - cart.items.len()
        );
    }

    let mut lines = vec![];
    let mut stock_warnings = vec![];

    for item in &cart.items {
        let Some(product) = products.get(&item.product_id) else {
            continue;
        };

        if product.stock < item.quantity {
            stock_warnings.push(format!(
                "{}: requested {}, available {}",
                product.name, item.quantity, product.stock
            ));
        }

        lines.push(json!({
            "id": item.id,
            "product_id": item.product_id,
            "name": product.name,
            "images": product.images,
            "price": item.price,
            "current_price": product.price,
            "quantity": item.quantity,
            "stock": product.stock,
            "subtotal": item.subtotal(),
        }));
    }

    CartCalculation {
        lines,
        total: cart.total_amount(),
        stock_warnings,
    }
}

fn cart_body(message: Option<&str>, cart: &mut Cart, products: &DashMap<Uuid, Product>) -> Value {
    let calc = prune_and_price(cart, products);
    let mut body = json!({
        "cart": {
            "user_id": cart.user_id,
            "items": calc.lines,
            "total_amount": calc.total,
            "total_items": cart.total_quantity(),
            "created_at": cart.created_at,
            "updated_at": cart.updated_at,
        },
        "stock_warnings": calc.stock_warnings,
    });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    body
}

/// Voir le panier (créé vide au premier accès)
pub async fn view_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let mut cart = state
        .carts
        .entry(user.id)
        .or_insert_with(|| Cart::new(user.id));

    Ok(Json(cart_body(None, &mut cart, &state.products)))
}

/// Ajouter un article au panier
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<AddToCartRequest>,
) -> Result<Json<Value>, AppError> {
    // Lecture produit relâchée avant de verrouiller le panier
    let (price, stock) = {
        let product = state
            .products
            .get(&req.product_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
        (product.price, product.stock)
    };

    if stock < req.quantity {
        return Err(AppError::BadRequest(format!(
            "Only {stock} items available in stock"
        )));
    }

    let mut cart = state
        .carts
        .entry(user.id)
        .or_insert_with(|| Cart::new(user.id));

    if let Some(item) = cart.items.iter_mut().find(|i| i.product_id == req.product_id) {
        let new_quantity = item.quantity + req.quantity;
        if new_quantity > stock {
            return Err(AppError::BadRequest(format!(
                "Cannot add more items. Only {stock} available in stock"
            )));
        }
        item.quantity = new_quantity;
        item.price = price;
    } else {
        cart.items.push(CartItem {
            id: Uuid::new_v4(),
            product_id: req.product_id,
            quantity: req.quantity,
            price,
        });
    }
    cart.updated_at = Utc::now();

    tracing::info!("✅ Article ajouté au panier pour user {}", user.id);

    Ok(Json(cart_body(
        Some("Item added to cart successfully"),
        &mut cart,
        &state.products,
    )))
}

/// Modifier la quantité d'une ligne
pub async fn update_cart_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(item_id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<UpdateCartItemRequest>,
) -> Result<Json<Value>, AppError> {
    let mut cart = state
        .carts
        .get_mut(&user.id)
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

    let index = cart
        .items
        .iter()
        .position(|i| i.id == item_id)
        .ok_or_else(|| AppError::NotFound("Item not found in cart".to_string()))?;

    let (price, stock) = {
        let product = state
            .products
            .get(&cart.items[index].product_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Product no longer available".to_string()))?;
        (product.price, product.stock)
    };

    if stock < req.quantity {
        return Err(AppError::BadRequest(format!(
            "Only {stock} items available in stock"
        )));
    }

    cart.items[index].quantity = req.quantity;
    cart.items[index].price = price;
    cart.updated_at = Utc::now();

    Ok(Json(cart_body(
        Some("Cart updated successfully"),
        &mut cart,
        &state.products,
    )))
}

/// Retirer une ligne du panier
pub async fn remove_cart_item(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(item_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let mut cart = state
        .carts
        .get_mut(&user.id)
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

    cart.items.retain(|i| i.id != item_id);
    cart.updated_at = Utc::now();

    Ok(Json(cart_body(
        Some("Item removed from cart successfully"),
        &mut cart,
        &state.products,
    )))
}

/// Vider le panier
pub async fn clear_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let mut cart = state
        .carts
        .get_mut(&user.id)
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

    cart.items.clear();
    cart.updated_at = Utc::now();

    Ok(Json(cart_body(
        Some("Cart cleared successfully"),
        &mut cart,
        &state.products,
    )))
}

/// Passer commande à partir du panier
pub async fn checkout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(details): ValidJson<OrderDetails>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let order = order_service::checkout(&state, user.id, details)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Order created successfully from cart",
            "order": order,
        })),
    ))
}
