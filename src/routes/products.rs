// Routes du catalogue produits

use std::collections::BTreeSet;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::extract::{ValidJson, ValidPath, ValidQuery};
use crate::models::*;
use crate::pagination::PageRequest;
use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 12;

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Name,
    Price,
    #[default]
    CreatedAt,
    Stock,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u64>,
    #[validate(length(min = 1, message = "Search term cannot be empty"))]
    pub search: Option<String>,
    pub category: Option<Category>,
    #[validate(length(min = 1, message = "Brand cannot be empty"))]
    pub brand: Option<String>,
    #[validate(range(min = 0, message = "Min price must be a positive number"))]
    pub min_price: Option<i64>,
    #[validate(range(min = 0, message = "Max price must be a positive number"))]
    pub max_price: Option<i64>,
    pub sort_by: Option<ProductSort>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    fn matches(&self, product: &Product) -> bool {
        product.is_active
            && self.search.as_deref().map_or(true, |s| product.matches_search(s))
            && self.category.map_or(true, |c| product.category == c)
            && self.brand.as_deref().map_or(true, |b| {
                product.brand.to_lowercase().contains(&b.to_lowercase())
            })
            && self.min_price.map_or(true, |min| product.price >= min)
            && self.max_price.map_or(true, |max| product.price <= max)
    }
}

fn sort_products(products: &mut [Product], sort_by: ProductSort, order: SortOrder) {
    products.sort_by(|a, b| {
        let ordering = match sort_by {
            ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            ProductSort::Price => a.price.cmp(&b.price),
            ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
            ProductSort::Stock => a.stock.cmp(&b.stock),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Lister les produits actifs avec recherche, filtres et tri
pub async fn list_products(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ProductQuery>,
) -> Result<Json<Value>, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);

    let mut products: Vec<Product> = state
        .products
        .iter()
        .filter(|entry| query.matches(entry.value()))
        .map(|entry| entry.value().clone())
        .collect();

    sort_products(
        &mut products,
        query.sort_by.unwrap_or_default(),
        query.sort_order.unwrap_or_default(),
    );

    // Facettes disponibles pour les filtres du front
    let mut categories = BTreeSet::new();
    let mut brands = BTreeSet::new();
    for entry in state.products.iter().filter(|e| e.value().is_active) {
        categories.insert(entry.value().category);
        brands.insert(entry.value().brand.clone());
    }

    let result = page.apply(products);

    Ok(Json(json!({
        "products": result.items,
        "pagination": result.pagination,
        "filters": {
            "categories": categories,
            "brands": brands,
        },
    })))
}

/// Récupérer un produit actif
pub async fn get_product(
    State(state): State<AppState>,
    ValidPath(product_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let product = state
        .products
        .get(&product_id)
        .filter(|p| p.is_active)
        .map(|p| p.clone())
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(Json(json!({ "product": product })))
}

/// Créer un produit (admin)
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidJson(req): ValidJson<ProductRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let product = Product::new(req, admin.id);
    state.insert_product(product.clone());

    tracing::info!("✅ Produit {} créé par {}", product.id, admin.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Product created successfully",
            "product": product,
        })),
    ))
}

/// Mettre à jour un produit (admin)
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidPath(product_id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<ProductRequest>,
) -> Result<Json<Value>, AppError> {
    let mut product = state
        .products
        .get_mut(&product_id)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    product.apply(req);

    Ok(Json(json!({
        "message": "Product updated successfully",
        "product": product.clone(),
    })))
}

/// Suppression logique: le produit reste référencé par les commandes
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidPath(product_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let mut product = state
        .products
        .get_mut(&product_id)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    product.is_active = false;
    product.updated_at = chrono::Utc::now();

    tracing::info!("🗑️ Produit {} désactivé par {}", product_id, admin.username);

    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

/// Réapprovisionnement manuel (admin)
pub async fn update_stock(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidPath(product_id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<UpdateStockRequest>,
) -> Result<Json<Value>, AppError> {
    let mut product = state
        .products
        .get_mut(&product_id)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    product.stock = req.stock;
    product.updated_at = chrono::Utc::now();

    Ok(Json(json!({
        "message": "Stock updated successfully",
        "product": product.clone(),
    })))
}
