pub mod cart;
pub mod health;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;
