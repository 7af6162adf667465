use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    /// Stable display identifier (LIC-XXXXXXXX), globally unique.
    /// This is what owners and external clients pass around; the internal
    /// `id` never leaves the database layer.
    pub license_id: String,
    pub user_id: String,
    pub product_id: String,
    pub transaction_id: String,
    pub is_active: bool,
    pub is_rental: bool,
    /// Hard expiry for rentals; perpetual licenses keep this NULL and it is
    /// never enforced for them.
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

/// Purchase-completed event delivered by the checkout collaborator.
/// Delivery is at-least-once; issuance is keyed on (transaction_id, product_id).
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseCompleted {
    pub transaction_id: String,
    pub user_id: String,
    pub product_id: String,
    #[serde(default)]
    pub is_rental: bool,
    #[serde(default)]
    pub rental_duration_days: Option<i64>,
}
