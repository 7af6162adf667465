//! Tradekey - licensing core for a trading-product marketplace
//!
//! Issues licenses from completed purchases, enforces per-license activation
//! quotas over trading-account identities, and produces signed offline
//! artifacts that a constrained external client can verify without network
//! access.

pub mod artifact;
pub mod config;
pub mod db;
pub mod error;
pub mod expiry;
pub mod handlers;
pub mod models;
pub mod rate_limit;
