use serde::{Deserialize, Serialize};

/// Product catalog entry. Owned by the storefront; this core only reads
/// `max_activations` to enforce the per-license quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub max_activations: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub max_activations: i64,
}
