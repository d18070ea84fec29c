use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ========== Catalogue ==========

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Electronics,
    Clothing,
    Books,
    Home,
    Sports,
    Health,
    Food,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Clothing => "clothing",
            Category::Books => "books",
            Category::Home => "home",
            Category::Sports => "sports",
            Category::Health => "health",
            Category::Food => "food",
            Category::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Dimensions {
    #[validate(range(min = 0.0, message = "Length must be a positive number"))]
    pub length: f64,
    #[validate(range(min = 0.0, message = "Width must be a positive number"))]
    pub width: f64,
    #[validate(range(min = 0.0, message = "Height must be a positive number"))]
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64, // En centimes
    pub category: Category,
    pub brand: String,
    pub stock: u32,
    pub images: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(req: ProductRequest, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            description: req.description.trim().to_string(),
            price: req.price,
            category: req.category,
            brand: req.brand.trim().to_string(),
            stock: req.stock,
            images: req.images,
            specifications: req.specifications,
            weight: req.weight,
            dimensions: req.dimensions,
            tags: req.tags.into_iter().map(|t| t.trim().to_string()).collect(),
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Remplace les champs éditables. L'identité, le créateur et le flag
    /// `is_active` ne bougent pas.
    pub fn apply(&mut self, req: ProductRequest) {
        self.name = req.name.trim().to_string();
        self.description = req.description.trim().to_string();
        self.price = req.price;
        self.category = req.category;
        self.brand = req.brand.trim().to_string();
        self.stock = req.stock;
        self.images = req.images;
        self.specifications = req.specifications;
        self.weight = req.weight;
        self.dimensions = req.dimensions;
        self.tags = req.tags.into_iter().map(|t| t.trim().to_string()).collect();
        self.updated_at = Utc::now();
    }

    /// Recherche plein texte naïve: au moins un terme doit apparaître dans
    /// le nom, la description, la marque, la catégorie ou les tags.
    pub fn matches_search(&self, search: &str) -> bool {
        let haystacks = [
            self.name.to_lowercase(),
            self.description.to_lowercase(),
            self.brand.to_lowercase(),
            self.category.as_str().to_string(),
            self.tags.join(" ").to_lowercase(),
        ];

        search
            .split_whitespace()
            .map(str::to_lowercase)
            .any(|term| haystacks.iter().any(|h| h.contains(&term)))
    }
}

// ========== Panier ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub price: i64, // Prix au moment de l'ajout
}

impl CartItem {
    pub fn subtotal(&self) -> i64 {
        self.price.saturating_mul(self.quantity as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            items: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_amount(&self) -> i64 {
        self.items
            .iter()
            .map(CartItem::subtotal)
            .fold(0, i64::saturating_add)
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// ========== Commandes ==========

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Un client ne peut annuler qu'avant la préparation.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Statuts qui comptent dans le chiffre d'affaires.
    pub fn counts_as_revenue(&self) -> bool {
        matches!(
            self,
            OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered
        )
    }

    /// Statuts qui prouvent un achat (avis vérifié).
    pub fn proves_purchase(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    CashOnDelivery,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Address {
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub price: i64, // Prix au moment de l'achat
}

impl OrderItem {
    pub fn subtotal(&self) -> i64 {
        self.price.saturating_mul(self.quantity as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn contains_product(&self, product_id: Uuid) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }
}

// ========== Avis ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub verified: bool,
    pub helpful: u32,
    pub reported: bool,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========== Utilisateurs ==========

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str, email: &str, first_name: &str, last_name: &str, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_lowercase(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Le propriétaire d'une ressource ou un admin.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.id == owner_id
    }

    pub fn matches_search(&self, search: &str) -> bool {
        let needle = search.to_lowercase();
        [&self.username, &self.email, &self.first_name, &self.last_name]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

// ========== Requêtes API ==========

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Product name is required and must be less than 100 characters"
    ))]
    pub name: String,
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Description is required and must be less than 1000 characters"
    ))]
    pub description: String,
    #[validate(range(
        min = 0,
        max = 100_000_000,
        message = "Price must be between 0 and 1000000.00"
    ))]
    pub price: i64,
    pub category: Category,
    #[validate(length(
        min = 1,
        max = 50,
        message = "Brand is required and must be less than 50 characters"
    ))]
    pub brand: String,
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[validate(range(min = 0.0, message = "Weight must be a positive number"))]
    pub weight: Option<f64>,
    #[validate(nested)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStockRequest {
    pub stock: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 99, message = "Quantity must be between 1 and 99"))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, max = 99, message = "Quantity must be between 1 and 99"))]
    pub quantity: u32,
}

/// Informations de livraison et de paiement communes au checkout et aux
/// commandes directes.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderDetails {
    #[validate(nested)]
    pub shipping_address: Address,
    #[validate(nested)]
    pub billing_address: Address,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500, message = "Notes must be less than 500 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be a positive integer"))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    #[validate(nested)]
    pub items: Vec<OrderLineRequest>,
    #[serde(flatten)]
    #[validate(nested)]
    pub details: OrderDetails,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(min = 1, message = "Tracking number cannot be empty"))]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title is required and must be less than 100 characters"
    ))]
    pub title: String,
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment is required and must be less than 1000 characters"
    ))]
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<u8>,
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "Comment must be 1-1000 characters"))]
    pub comment: Option<String>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters"))]
    pub last_name: Option<String>,
    #[validate(length(min = 3, max = 30, message = "Username must be 3-30 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
}
