//! Product catalog entries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub description: String,
}

/// Catalog seeded on first start when no product snapshot exists yet.
pub fn default_catalog() -> Vec<Product> {
    vec![
        Product {
            id: 1,
            name: "Veg Biryani".to_string(),
            price: 150.0,
            category: "Main Course".to_string(),
            description: "Delicious vegetable biryani with aromatic spices".to_string(),
        },
        Product {
            id: 2,
            name: "Paneer Tikka".to_string(),
            price: 200.0,
            category: "Starters".to_string(),
            description: "Grilled cottage cheese with spices".to_string(),
        },
        Product {
            id: 3,
            name: "Gulab Jamun".to_string(),
            price: 50.0,
            category: "Desserts".to_string(),
            description: "Sweet milk-based dessert".to_string(),
        },
    ]
}
