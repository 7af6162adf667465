use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activation {
    pub id: String,
    pub license_id: String,
    /// Trading-account login as reported by the client terminal.
    pub account_login: String,
    /// Broker server name the account lives on.
    pub account_server: String,
    pub is_active: bool,
    pub activated_at: i64,
    pub deactivated_at: Option<i64>,
    pub created_at: i64,
}
