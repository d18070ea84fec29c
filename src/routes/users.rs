// Routes de gestion des utilisateurs

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::auth::{AdminUser, AuthUser};
use crate::error::AppError;
use crate::extract::{ValidJson, ValidPath, ValidQuery};
use crate::models::*;
use crate::pagination::PageRequest;
use crate::state::{claim_key, release_key, AppState};

const DEFAULT_LIMIT: u64 = 10;
const RECENT_ORDERS: usize = 10;

#[derive(Debug, Deserialize, Validate)]
pub struct ListUsersQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u64>,
    #[validate(length(min = 1, message = "Search term cannot be empty"))]
    pub search: Option<String>,
}

fn find_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .users
        .get(&user_id)
        .map(|u| u.clone())
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Lister les utilisateurs (admin)
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidQuery(query): ValidQuery<ListUsersQuery>,
) -> Result<Json<Value>, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);

    let mut users: Vec<User> = state
        .users
        .iter()
        .filter(|e| {
            query
                .search
                .as_deref()
                .map_or(true, |s| e.value().matches_search(s))
        })
        .map(|e| e.value().clone())
        .collect();
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let result = page.apply(users);

    Ok(Json(json!({
        "users": result.items,
        "pagination": result.pagination,
    })))
}

/// Détails d'un utilisateur avec commandes, panier et statistiques (admin)
pub async fn user_details(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidPath(user_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user = find_user(&state, user_id)?;

    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|e| e.value().user_id == user_id)
        .map(|e| e.value().clone())
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total_orders = orders.len();
    let total_spent: i64 = orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled)
        .map(|o| o.total_amount)
        .fold(0, i64::saturating_add);

    let mut orders_by_status: BTreeMap<OrderStatus, usize> = BTreeMap::new();
    for order in &orders {
        *orders_by_status.entry(order.status).or_default() += 1;
    }

    let cart = state
        .carts
        .get(&user_id)
        .map(|c| c.clone())
        .unwrap_or_else(|| Cart::new(user_id));

    orders.truncate(RECENT_ORDERS);

    Ok(Json(json!({
        "user": user,
        "orders": orders,
        "cart": cart,
        "statistics": {
            "total_orders": total_orders,
            "total_spent": total_spent,
            "cart_items": cart.items.len(),
            "orders_by_status": orders_by_status,
        },
    })))
}

/// Profil d'un utilisateur (lui-même ou admin)
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    ValidPath(user_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !current.can_access(user_id) {
        return Err(AppError::access_denied());
    }

    let user = find_user(&state, user_id)?;
    Ok(Json(json!({ "user": user })))
}

fn check_username(username: &str) -> Result<(), ValidationError> {
    if username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Ok(());
    }
    Err(ValidationError::new("alphanumeric")
        .with_message("Username must contain only letters and numbers".into()))
}

/// Nom ou prénom après trim: vide interdit.
fn trimmed_name(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        Some("") => Err(ValidationError::new("blank").with_message("Name cannot be blank".into())),
        other => Ok(other.map(String::from)),
    }
}

/// Contrôles qui ne passent pas par le derive: trim puis format.
fn normalize(req: &UpdateUserRequest) -> Result<(Option<String>, Option<String>), AppError> {
    let mut errors = ValidationErrors::new();

    let first_name = trimmed_name(req.first_name.as_deref()).unwrap_or_else(|e| {
        errors.add("first_name", e);
        None
    });
    let last_name = trimmed_name(req.last_name.as_deref()).unwrap_or_else(|e| {
        errors.add("last_name", e);
        None
    });
    if let Some(Err(e)) = req.username.as_deref().map(check_username) {
        errors.add("username", e);
    }

    if errors.is_empty() {
        Ok((first_name, last_name))
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Mettre à jour un profil (lui-même ou admin)
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    ValidPath(user_id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    if !current.can_access(user_id) {
        return Err(AppError::access_denied());
    }

    let (first_name, last_name) = normalize(&req)?;
    let existing = find_user(&state, user_id)?;

    let username = req.username.filter(|u| *u != existing.username);
    let email = req
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| *e != existing.email);

    // Unicité: les nouvelles clés sont réservées avant toute écriture
    if let Some(username) = &username {
        if !claim_key(&state.usernames, username, user_id) {
            return Err(AppError::Conflict("This username is already taken".to_string()));
        }
    }
    if let Some(email) = &email {
        if !claim_key(&state.emails, email, user_id) {
            if let Some(username) = &username {
                release_key(&state.usernames, username, user_id);
            }
            return Err(AppError::Conflict("This email is already taken".to_string()));
        }
    }

    let Some(mut user) = state.users.get_mut(&user_id) else {
        if let Some(username) = &username {
            release_key(&state.usernames, username, user_id);
        }
        if let Some(email) = &email {
            release_key(&state.emails, email, user_id);
        }
        return Err(AppError::NotFound("User not found".to_string()));
    };

    if let Some(first_name) = first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = last_name {
        user.last_name = last_name;
    }
    if let Some(username) = username {
        let old = std::mem::replace(&mut user.username, username);
        release_key(&state.usernames, &old, user_id);
    }
    if let Some(email) = email {
        let old = std::mem::replace(&mut user.email, email);
        release_key(&state.emails, &old, user_id);
    }
    user.updated_at = Utc::now();

    Ok(Json(json!({
        "message": "User updated successfully",
        "user": user.clone(),
    })))
}

/// Supprimer un utilisateur (admin, pas soi-même)
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidPath(user_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if admin.id == user_id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    state
        .remove_user(user_id)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!("Utilisateur {} supprimé par {}", user_id, admin.username);

    Ok(Json(json!({ "message": "User deleted successfully" })))
}

/// Activer / désactiver un compte (admin, pas soi-même)
pub async fn toggle_user_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidPath(user_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    if admin.id == user_id {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let mut user = state
        .users
        .get_mut(&user_id)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    user.is_active = !user.is_active;
    user.updated_at = Utc::now();

    let verb = if user.is_active { "activated" } else { "deactivated" };

    Ok(Json(json!({
        "message": format!("User {verb} successfully"),
        "user": user.clone(),
    })))
}
