// Routes des commandes

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::error::AppError;
use crate::extract::{ValidJson, ValidPath, ValidQuery};
use crate::models::*;
use crate::pagination::PageRequest;
use crate::services::order_service;
use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Deserialize, Validate)]
pub struct ListOrdersQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u64>,
    pub status: Option<OrderStatus>,
    pub user_id: Option<Uuid>,
    pub order_number: Option<String>,
    pub user_search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MyOrdersQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u64>,
    pub status: Option<OrderStatus>,
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Lister les commandes: les siennes, ou toutes pour un admin
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<ListOrdersQuery>,
) -> Result<Json<Value>, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);

    let owner_filter = if user.is_admin() {
        query.user_id
    } else {
        Some(user.id)
    };

    // Recherche par client, réservée aux admins
    let matching_users: Option<Vec<Uuid>> = match (&query.user_search, user.is_admin()) {
        (Some(search), true) => Some(
            state
                .users
                .iter()
                .filter(|u| u.value().matches_search(search))
                .map(|u| *u.key())
                .collect(),
        ),
        _ => None,
    };

    let number_search = query.order_number.as_deref().map(str::to_lowercase);

    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|o| owner_filter.map_or(true, |id| o.user_id == id))
        .filter(|o| query.status.map_or(true, |s| o.status == s))
        .filter(|o| {
            number_search
                .as_deref()
                .map_or(true, |n| o.order_number.to_lowercase().contains(n))
        })
        .filter(|o| {
            matching_users
                .as_ref()
                .map_or(true, |ids| ids.contains(&o.user_id))
        })
        .collect();
    newest_first(&mut orders);

    let result = page.apply(orders);

    Ok(Json(json!({
        "orders": result.items,
        "pagination": result.pagination,
    })))
}

/// Commandes de l'utilisateur courant
pub async fn my_orders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<MyOrdersQuery>,
) -> Result<Json<Value>, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);

    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| entry.value().user_id == user.id)
        .filter(|entry| query.status.map_or(true, |s| entry.value().status == s))
        .map(|entry| entry.value().clone())
        .collect();
    newest_first(&mut orders);

    let result = page.apply(orders);

    Ok(Json(json!({
        "orders": result.items,
        "pagination": result.pagination,
    })))
}

/// Récupérer une commande (propriétaire ou admin)
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(order_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let order = state
        .orders
        .get(&order_id)
        .map(|o| o.clone())
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if !user.can_access(order.user_id) {
        return Err(AppError::access_denied());
    }

    Ok(Json(json!({ "order": order })))
}

/// Commande directe sans passer par le panier
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let order = order_service::place_order(&state, user.id, &req.items, req.details)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Order created successfully",
            "order": order,
        })),
    ))
}

/// Changer le statut d'une commande (admin)
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidPath(order_id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<UpdateOrderStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let order = order_service::update_status(&state, order_id, req.status, req.tracking_number)?;

    Ok(Json(json!({
        "message": "Order status updated successfully",
        "order": order,
    })))
}

/// Annuler une commande en attente ou confirmée
pub async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(order_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let order = order_service::cancel_order(&state, &user, order_id)?;

    Ok(Json(json!({
        "message": "Order cancelled successfully",
        "order": order,
    })))
}

/// Statistiques globales (admin)
pub async fn order_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Value>, AppError> {
    let mut breakdown: BTreeMap<OrderStatus, (u64, i64)> = BTreeMap::new();
    let mut total_orders = 0u64;
    let mut total_revenue = 0i64;

    for entry in state.orders.iter() {
        let order = entry.value();
        total_orders += 1;
        if order.status.counts_as_revenue() {
            total_revenue = total_revenue.saturating_add(order.total_amount);
        }
        let slot = breakdown.entry(order.status).or_default();
        slot.0 += 1;
        slot.1 = slot.1.saturating_add(order.total_amount);
    }

    let status_breakdown: Vec<Value> = breakdown
        .into_iter()
        .map(|(status, (count, total_value))| {
            json!({ "status": status, "count": count, "total_value": total_value })
        })
        .collect();

    Ok(Json(json!({
        "total_orders": total_orders,
        "total_revenue": total_revenue,
        "status_breakdown": status_breakdown,
    })))
}
