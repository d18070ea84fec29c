pub mod inventory;
pub mod order_service;
