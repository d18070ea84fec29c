use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use uuid::Uuid;

use crate::config::Config;
use crate::models::*;

/// Magasin de documents en mémoire partagé entre les handlers.
///
/// Ordre de verrouillage: une entrée de `carts` ou de `orders` peut être
/// tenue pendant qu'on écrit dans `products`, jamais l'inverse.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub started_at: Instant,

    pub products: Arc<DashMap<Uuid, Product>>,
    pub carts: Arc<DashMap<Uuid, Cart>>,
    pub orders: Arc<DashMap<Uuid, Order>>,
    pub reviews: Arc<DashMap<Uuid, Review>>,
    pub users: Arc<DashMap<Uuid, User>>,

    // Index uniques
    pub order_numbers: Arc<DashSet<String>>,
    pub review_index: Arc<DashMap<(Uuid, Uuid), Uuid>>,
    pub usernames: Arc<DashMap<String, Uuid>>,
    pub emails: Arc<DashMap<String, Uuid>>,
}

/// Réserve `key` pour `user_id` dans un index unique.
///
/// Renvoie `false` si un autre utilisateur la détient déjà.
pub fn claim_key(index: &DashMap<String, Uuid>, key: &str, user_id: Uuid) -> bool {
    match index.entry(key.to_string()) {
        Entry::Occupied(owner) => *owner.get() == user_id,
        Entry::Vacant(slot) => {
            slot.insert(user_id);
            true
        }
    }
}

/// Libère `key` seulement si elle appartient encore à `user_id`.
pub fn release_key(index: &DashMap<String, Uuid>, key: &str, user_id: Uuid) {
    index.remove_if(key, |_, owner| *owner == user_id);
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let seed = config.seed_demo_data;

        let state = Self {
            config,
            started_at: Instant::now(),
            products: Arc::new(DashMap::new()),
            carts: Arc::new(DashMap::new()),
            orders: Arc::new(DashMap::new()),
            reviews: Arc::new(DashMap::new()),
            users: Arc::new(DashMap::new()),
            order_numbers: Arc::new(DashSet::new()),
            review_index: Arc::new(DashMap::new()),
            usernames: Arc::new(DashMap::new()),
            emails: Arc::new(DashMap::new()),
        };

        if seed {
            state.init_demo_data();
        }

        state
    }

    pub fn insert_user(&self, user: User) -> Uuid {
        let id = user.id;
        self.usernames.insert(user.username.clone(), id);
        self.emails.insert(user.email.clone(), id);
        self.users.insert(id, user);
        id
    }

    pub fn remove_user(&self, user_id: Uuid) -> Option<User> {
        let (_, user) = self.users.remove(&user_id)?;
        release_key(&self.usernames, &user.username, user_id);
        release_key(&self.emails, &user.email, user_id);
        Some(user)
    }

    pub fn insert_product(&self, product: Product) -> Uuid {
        let id = product.id;
        self.products.insert(id, product);
        id
    }

    fn init_demo_data(&self) {
        let admin = User::new("admin", "admin@ruststore.local", "Ada", "Admin", Role::Admin);
        let customer = User::new("customer", "customer@ruststore.local", "Carl", "Client", Role::User);
        let admin_id = self.insert_user(admin);
        let customer_id = self.insert_user(customer);

        let products = vec![
            ProductRequest {
                name: "Casquette Classic Rouge".to_string(),
                description: "Casquette classique rouge, ajustable".to_string(),
                price: 2500, // 25€
                category: Category::Clothing,
                brand: "RustWear".to_string(),
                stock: 50,
                images: vec![],
                specifications: BTreeMap::new(),
                weight: Some(0.1),
                dimensions: None,
                tags: vec!["casquette".to_string(), "rouge".to_string()],
            },
            ProductRequest {
                name: "Casque Audio Ferris".to_string(),
                description: "Casque sans fil à réduction de bruit".to_string(),
                price: 12900,
                category: Category::Electronics,
                brand: "Crab Audio".to_string(),
                stock: 15,
                images: vec![],
                specifications: BTreeMap::from([("autonomie".to_string(), "30h".to_string())]),
                weight: Some(0.25),
                dimensions: None,
                tags: vec!["audio".to_string()],
            },
            ProductRequest {
                name: "The Rust Programming Language".to_string(),
                description: "Le livre officiel du langage Rust".to_string(),
                price: 3990,
                category: Category::Books,
                brand: "No Starch".to_string(),
                stock: 20,
                images: vec![],
                specifications: BTreeMap::new(),
                weight: Some(0.9),
                dimensions: None,
                tags: vec!["rust".to_string(), "livre".to_string()],
            },
        ];

        for req in products {
            self.insert_product(Product::new(req, admin_id));
        }

        tracing::info!(
            "✅ Données de démo initialisées: {} produits, {} utilisateurs",
            self.products.len(),
            self.users.len()
        );
        tracing::info!("  - admin: {}", admin_id);
        tracing::info!("  - client: {}", customer_id);
    }
}
