// Transition panier -> commande et cycle de vie des commandes

use chrono::{Duration, Utc};
use dashmap::DashSet;
use rand::Rng;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::*;
use crate::services::inventory::{self, StockLine};
use crate::state::AppState;

const ESTIMATED_DELIVERY_DAYS: i64 = 7;

/// Numéro lisible `ORD-<millis>-<NNN>`, unique grâce à l'index des numéros.
pub fn generate_order_number(taken: &DashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = format!(
            "ORD-{}-{:03}",
            Utc::now().timestamp_millis(),
            rng.gen_range(0..1000)
        );
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }
}

fn build_order(state: &AppState, user_id: Uuid, items: Vec<OrderItem>, details: OrderDetails) -> Order {
    let now = Utc::now();
    let total_amount = items
        .iter()
        .map(OrderItem::subtotal)
        .fold(0, i64::saturating_add);

    Order {
        id: Uuid::new_v4(),
        order_number: generate_order_number(&state.order_numbers),
        user_id,
        items,
        total_amount,
        status: OrderStatus::Pending,
        shipping_address: details.shipping_address,
        billing_address: details.billing_address,
        payment_method: details.payment_method,
        notes: details.notes,
        tracking_number: None,
        estimated_delivery: now + Duration::days(ESTIMATED_DELIVERY_DAYS),
        created_at: now,
        updated_at: now,
    }
}

/// Transforme le panier de l'utilisateur en commande.
///
/// L'entrée panier reste verrouillée pendant toute l'opération: un ajout
/// concurrent au panier attend la fin du checkout.
pub fn checkout(state: &AppState, user_id: Uuid, details: OrderDetails) -> Result<Order, AppError> {
    let mut cart = state
        .carts
        .get_mut(&user_id)
        .filter(|cart| !cart.items.is_empty())
        .ok_or_else(|| AppError::BadRequest("Cart is empty".to_string()))?;

    let lines: Vec<StockLine> = cart.items.iter().map(StockLine::from).collect();
    let items = inventory::reserve(&state.products, &lines)?;

    let order = build_order(state, user_id, items, details);

    cart.items.clear();
    cart.updated_at = Utc::now();
    drop(cart);

    state.orders.insert(order.id, order.clone());

    tracing::info!(
        "💳 Checkout {} pour user {} - {} article(s), total: {}€",
        order.order_number,
        user_id,
        order.items.len(),
        order.total_amount as f64 / 100.0
    );

    Ok(order)
}

/// Commande directe à partir d'une liste de lignes, sans passer par le panier.
pub fn place_order(
    state: &AppState,
    user_id: Uuid,
    lines: &[OrderLineRequest],
    details: OrderDetails,
) -> Result<Order, AppError> {
    let lines: Vec<StockLine> = lines.iter().map(StockLine::from).collect();
    let items = inventory::reserve(&state.products, &lines)?;

    let order = build_order(state, user_id, items, details);
    state.orders.insert(order.id, order.clone());

    tracing::info!(
        "🧾 Commande {} créée pour user {} - total: {}€",
        order.order_number,
        user_id,
        order.total_amount as f64 / 100.0
    );

    Ok(order)
}

/// Annulation par le client (ou un admin), seulement en `pending` ou
/// `confirmed`. Le stock de chaque ligne est restitué.
pub fn cancel_order(state: &AppState, actor: &User, order_id: Uuid) -> Result<Order, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !actor.can_access(order.user_id) {
        return Err(AppError::access_denied());
    }

    if !order.status.is_cancellable() {
        return Err(AppError::BadRequest(format!(
            "Order cannot be cancelled. Current status: {}",
            order.status
        )));
    }

    inventory::release(&state.products, &order.items);
    order.status = OrderStatus::Cancelled;
    order.updated_at = Utc::now();

    tracing::info!("Commande {} annulée par {}", order.order_number, actor.id);

    Ok(order.clone())
}

/// Changement de statut par un admin.
///
/// Passer en `cancelled` restitue le stock; `cancelled` est terminal.
pub fn update_status(
    state: &AppState,
    order_id: Uuid,
    status: OrderStatus,
    tracking_number: Option<String>,
) -> Result<Order, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if order.status == OrderStatus::Cancelled && status != OrderStatus::Cancelled {
        return Err(AppError::Conflict(format!(
            "Cancelled orders cannot be moved to {status}"
        )));
    }

    if status == OrderStatus::Cancelled && order.status != OrderStatus::Cancelled {
        inventory::release(&state.products, &order.items);
    }

    let previous = order.status;
    order.status = status;
    if let Some(tracking) = tracking_number {
        order.tracking_number = Some(tracking);
    }
    order.updated_at = Utc::now();

    tracing::info!(
        "Commande {}: {} -> {}",
        order.order_number,
        previous,
        status
    );

    Ok(order.clone())
}
