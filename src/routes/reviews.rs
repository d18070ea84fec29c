// Routes des avis produits

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::error::AppError;
use crate::extract::{ValidJson, ValidPath, ValidQuery};
use crate::models::*;
use crate::pagination::PageRequest;
use crate::routes::products::SortOrder;
use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSort {
    Rating,
    #[default]
    CreatedAt,
    Helpful,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListReviewsQuery {
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<u8>,
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u64>,
    pub sort_by: Option<ReviewSort>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MyReviewsQuery {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatingCount {
    pub rating: u8,
    pub count: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatingStats {
    pub average_rating: f64,
    pub total_reviews: usize,
    pub distribution: Vec<RatingCount>,
}

/// Moyenne arrondie au dixième et répartition 1..=5.
pub fn rating_stats(ratings: &[u8]) -> Option<RatingStats> {
    if ratings.is_empty() {
        return None;
    }

    let sum: u32 = ratings.iter().map(|&r| r as u32).sum();
    let average = sum as f64 / ratings.len() as f64;

    Some(RatingStats {
        average_rating: (average * 10.0).round() / 10.0,
        total_reviews: ratings.len(),
        distribution: (1..=5)
            .map(|rating| RatingCount {
                rating,
                count: ratings.iter().filter(|&&r| r == rating).count(),
            })
            .collect(),
    })
}

fn visible_review(state: &AppState, review_id: Uuid) -> Result<Review, AppError> {
    state
        .reviews
        .get(&review_id)
        .filter(|r| !r.reported)
        .map(|r| r.clone())
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
}

/// Lister les avis publics
pub async fn list_reviews(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListReviewsQuery>,
) -> Result<Json<Value>, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);

    let mut reviews: Vec<Review> = state
        .reviews
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|r| !r.reported)
        .filter(|r| query.product_id.map_or(true, |id| r.product_id == id))
        .filter(|r| query.user_id.map_or(true, |id| r.user_id == id))
        .filter(|r| query.rating.map_or(true, |rating| r.rating == rating))
        .collect();

    let sort_by = query.sort_by.unwrap_or_default();
    let order = query.sort_order.unwrap_or_default();
    reviews.sort_by(|a, b| {
        let ordering = match sort_by {
            ReviewSort::Rating => a.rating.cmp(&b.rating),
            ReviewSort::CreatedAt => a.created_at.cmp(&b.created_at),
            ReviewSort::Helpful => a.helpful.cmp(&b.helpful),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    // Statistiques seulement quand on filtre sur un produit
    let stats = query.product_id.and_then(|product_id| {
        let ratings: Vec<u8> = state
            .reviews
            .iter()
            .filter(|e| e.value().product_id == product_id && !e.value().reported)
            .map(|e| e.value().rating)
            .collect();
        rating_stats(&ratings)
    });

    let result = page.apply(reviews);

    Ok(Json(json!({
        "reviews": result.items,
        "pagination": result.pagination,
        "rating_stats": stats,
    })))
}

/// Avis de l'utilisateur courant
pub async fn my_reviews(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<MyReviewsQuery>,
) -> Result<Json<Value>, AppError> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);

    let mut reviews: Vec<Review> = state
        .reviews
        .iter()
        .filter(|e| e.value().user_id == user.id)
        .map(|e| e.value().clone())
        .collect();
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let result = page.apply(reviews);

    Ok(Json(json!({
        "reviews": result.items,
        "pagination": result.pagination,
    })))
}

pub async fn get_review(
    State(state): State<AppState>,
    ValidPath(review_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let review = visible_review(&state, review_id)?;
    Ok(Json(json!({ "review": review })))
}

/// Publier un avis (un seul par produit et par utilisateur)
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let product_active = state
        .products
        .get(&req.product_id)
        .map_or(false, |p| p.is_active);
    if !product_active {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    // Achat vérifié: une commande expédiée ou livrée contenant le produit
    let verified = state.orders.iter().any(|entry| {
        let order = entry.value();
        order.user_id == user.id
            && order.status.proves_purchase()
            && order.contains_product(req.product_id)
    });

    let now = Utc::now();
    let review = Review {
        id: Uuid::new_v4(),
        product_id: req.product_id,
        user_id: user.id,
        rating: req.rating,
        title: req.title.trim().to_string(),
        comment: req.comment.trim().to_string(),
        verified,
        helpful: 0,
        reported: false,
        images: req.images,
        created_at: now,
        updated_at: now,
    };

    match state.review_index.entry((req.product_id, user.id)) {
        Entry::Occupied(_) => {
            return Err(AppError::Conflict(
                "You have already reviewed this product".to_string(),
            ))
        }
        Entry::Vacant(slot) => {
            slot.insert(review.id);
            state.reviews.insert(review.id, review.clone());
        }
    }

    tracing::info!(
        "⭐ Avis {} ({}/5) sur {} par {}",
        review.id,
        review.rating,
        review.product_id,
        user.username
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Review created successfully",
            "review": review,
        })),
    ))
}

/// Modifier son propre avis
pub async fn update_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(review_id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<UpdateReviewRequest>,
) -> Result<Json<Value>, AppError> {
    let mut review = state
        .reviews
        .get_mut(&review_id)
        .filter(|r| !r.reported)
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    if review.user_id != user.id {
        return Err(AppError::access_denied());
    }

    if let Some(rating) = req.rating {
        review.rating = rating;
    }
    if let Some(title) = req.title {
        review.title = title.trim().to_string();
    }
    if let Some(comment) = req.comment {
        review.comment = comment.trim().to_string();
    }
    if let Some(images) = req.images {
        review.images = images;
    }
    review.updated_at = Utc::now();

    Ok(Json(json!({
        "message": "Review updated successfully",
        "review": review.clone(),
    })))
}

/// Supprimer un avis (auteur ou admin)
pub async fn delete_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(review_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (product_id, author_id) = state
        .reviews
        .get(&review_id)
        .map(|r| (r.product_id, r.user_id))
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    if !user.can_access(author_id) {
        return Err(AppError::access_denied());
    }

    state.reviews.remove(&review_id);
    state
        .review_index
        .remove_if(&(product_id, author_id), |_, id| *id == review_id);

    Ok(Json(json!({ "message": "Review deleted successfully" })))
}

/// Marquer un avis comme utile
pub async fn mark_helpful(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    ValidPath(review_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let mut review = state
        .reviews
        .get_mut(&review_id)
        .filter(|r| !r.reported)
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    review.helpful += 1;

    Ok(Json(json!({
        "message": "Review marked as helpful",
        "helpful": review.helpful,
    })))
}

/// Signaler / rétablir un avis (admin)
pub async fn toggle_report(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ValidPath(review_id): ValidPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let mut review = state
        .reviews
        .get_mut(&review_id)
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    review.reported = !review.reported;
    review.updated_at = Utc::now();

    let verb = if review.reported { "reported" } else { "unreported" };

    Ok(Json(json!({
        "message": format!("Review {verb} successfully"),
        "review": review.clone(),
    })))
}
