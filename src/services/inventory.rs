// Réservation et restitution du stock produit

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CartItem, OrderItem, OrderLineRequest, Product};

/// Une ligne à prélever sur le stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

impl From<&CartItem> for StockLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

impl From<&OrderLineRequest> for StockLine {
    fn from(line: &OrderLineRequest) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
        }
    }
}

/// Prélève le stock de toutes les lignes, ou d'aucune.
///
/// Chaque vérification + décrément se fait sous le verrou d'écriture de
/// l'entrée produit, deux checkouts concurrents ne peuvent donc pas
/// survendre. Si une ligne échoue, les lignes déjà prélevées sont
/// restituées avant de renvoyer l'erreur.
///
/// Les lignes retournées portent le nom et le prix unitaire courants du
/// produit (prix au moment de l'achat).
pub fn reserve(
    products: &DashMap<Uuid, Product>,
    lines: &[StockLine],
) -> Result<Vec<OrderItem>, AppError> {
    let mut reserved: Vec<OrderItem> = Vec::with_capacity(lines.len());

    for line in lines {
        match take(products, line) {
            Ok(item) => reserved.push(item),
            Err(err) => {
                tracing::warn!(
                    "⚠️ Réservation refusée pour {}: {} ({} ligne(s) restituée(s))",
                    line.product_id,
                    err,
                    reserved.len()
                );
                release(products, &reserved);
                return Err(err);
            }
        }
    }

    Ok(reserved)
}

fn take(products: &DashMap<Uuid, Product>, line: &StockLine) -> Result<OrderItem, AppError> {
    let mut product = products
        .get_mut(&line.product_id)
        .ok_or_else(|| AppError::ProductUnavailable(line.product_id.to_string()))?;

    if !product.is_active {
        return Err(AppError::ProductUnavailable(product.name.clone()));
    }

    let remaining = product
        .stock
        .checked_sub(line.quantity)
        .ok_or_else(|| AppError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
            requested: line.quantity,
        })?;

    product.stock = remaining;
    product.updated_at = Utc::now();

    Ok(OrderItem {
        product_id: product.id,
        product_name: product.name.clone(),
        quantity: line.quantity,
        price: product.price,
    })
}

/// Restitue exactement les quantités des lignes données. Les produits
/// désactivés sont réapprovisionnés aussi; seuls les produits disparus
/// sont ignorés.
pub fn release(products: &DashMap<Uuid, Product>, items: &[OrderItem]) {
    for item in items {
        match products.get_mut(&item.product_id) {
            Some(mut product) => {
                product.stock = product.stock.saturating_add(item.quantity);
                product.updated_at = Utc::now();
            }
            None => tracing::warn!(
                "Produit {} introuvable, {} unité(s) non restituée(s)",
                item.product_id,
                item.quantity
            ),
        }
    }
}
