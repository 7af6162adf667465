use chrono::Utc;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::expiry;
use crate::models::*;

use super::from_row::{ACTIVATION_COLS, LICENSE_COLS, PRODUCT_COLS, query_all, query_one};

const SECONDS_PER_DAY: i64 = 86400;

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a candidate display license ID: LIC-XXXXXXXX.
/// Callers must collision-check against existing rows before inserting.
fn gen_license_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("LIC-{}", hex[..8].to_uppercase())
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    if input.max_activations < 1 {
        return Err(AppError::BadRequest(
            "max_activations must be at least 1".into(),
        ));
    }

    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO products (id, name, max_activations, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![&id, &input.name, input.max_activations, now],
    )?;

    Ok(Product {
        id,
        name: input.name.clone(),
        max_activations: input.max_activations,
        created_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

// ============ Licenses ============

/// Issue a license for a completed purchase.
///
/// Idempotent under at-least-once event delivery: a repeat of the same
/// (transaction_id, product_id) returns the already-issued license instead of
/// creating a duplicate. The IMMEDIATE transaction serializes concurrent
/// deliveries of the same event against the unique constraint.
pub fn issue_license(conn: &mut Connection, event: &PurchaseCompleted) -> Result<License> {
    let rental_days = if event.is_rental {
        let days = event.rental_duration_days.unwrap_or(0);
        if days <= 0 {
            return Err(AppError::BadRequest(
                "rental_duration_days must be positive for rentals".into(),
            ));
        }
        Some(days)
    } else {
        None
    };

    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    if get_product_by_id(&tx, &event.product_id)?.is_none() {
        return Err(AppError::NotFound("Product not found".into()));
    }

    // Redelivered event: hand back the existing license.
    let existing: Option<License> = query_one(
        &tx,
        &format!(
            "SELECT {} FROM licenses WHERE transaction_id = ?1 AND product_id = ?2",
            LICENSE_COLS
        ),
        params![&event.transaction_id, &event.product_id],
    )?;
    if let Some(license) = existing {
        tx.commit()?;
        return Ok(license);
    }

    let now = now();
    let expires_at = rental_days.map(|days| now + days * SECONDS_PER_DAY);

    // Display IDs are short, so collision-check before use.
    let license_id = loop {
        let candidate = gen_license_id();
        let taken: i64 = tx.query_row(
            "SELECT COUNT(*) FROM licenses WHERE license_id = ?1",
            params![&candidate],
            |row| row.get(0),
        )?;
        if taken == 0 {
            break candidate;
        }
    };

    let id = gen_id();
    tx.execute(
        "INSERT INTO licenses (id, license_id, user_id, product_id, transaction_id, is_active, is_rental, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8)",
        params![
            &id,
            &license_id,
            &event.user_id,
            &event.product_id,
            &event.transaction_id,
            event.is_rental,
            expires_at,
            now
        ],
    )?;
    tx.commit()?;

    tracing::info!(
        license_id = %license_id,
        product_id = %event.product_id,
        is_rental = event.is_rental,
        "issued license"
    );

    Ok(License {
        id,
        license_id,
        user_id: event.user_id.clone(),
        product_id: event.product_id.clone(),
        transaction_id: event.transaction_id.clone(),
        is_active: true,
        is_rental: event.is_rental,
        expires_at,
        created_at: now,
    })
}

/// Look up a license by its display ID (the one owners and clients hold).
pub fn get_license_by_license_id(conn: &Connection, license_id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE license_id = ?1", LICENSE_COLS),
        &[&license_id],
    )
}

pub fn list_licenses_for_user(conn: &Connection, user_id: &str) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE user_id = ?1 ORDER BY created_at DESC",
            LICENSE_COLS
        ),
        &[&user_id],
    )
}

/// Administrative kill switch. Expiry of rentals needs no such step; it is
/// derived from expires_at.
pub fn deactivate_license(conn: &Connection, license_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET is_active = 0 WHERE license_id = ?1",
        params![license_id],
    )?;
    Ok(affected > 0)
}

// ============ Activations ============

/// Summary of a license's activation state. `current_activations` is always
/// derived by counting live rows, never read from a stored counter.
#[derive(Debug)]
pub struct ActivationSummary {
    pub license: License,
    pub product: Product,
    pub current_activations: i64,
    pub activations: Vec<Activation>,
}

/// Atomically activate a trading account on a license, enforcing the
/// activation quota.
///
/// The duplicate check, the live count, and the insert all happen inside one
/// IMMEDIATE transaction, which takes SQLite's write lock up front. Two
/// concurrent requests therefore cannot both observe count < max and both
/// insert; the loser of the race re-runs its checks against the committed
/// state and fails with QuotaExceeded (or Conflict for a duplicate).
pub fn activate_account(
    conn: &mut Connection,
    license_id: &str,
    account_login: &str,
    account_server: &str,
) -> Result<Activation> {
    if account_login.trim().is_empty() || account_server.trim().is_empty() {
        return Err(AppError::BadRequest(
            "account_login and account_server are required".into(),
        ));
    }

    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let license: License = query_one(
        &tx,
        &format!("SELECT {} FROM licenses WHERE license_id = ?1", LICENSE_COLS),
        &[&license_id],
    )?
    .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    if !expiry::is_valid(&license) {
        return Err(AppError::Expired("License is inactive or expired".into()));
    }

    let product: Product = query_one(
        &tx,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&license.product_id],
    )?
    .ok_or_else(|| AppError::Internal("Product not found for license".into()))?;

    let duplicate: i64 = tx.query_row(
        "SELECT COUNT(*) FROM activations
         WHERE license_id = ?1 AND account_login = ?2 AND account_server = ?3 AND is_active = 1",
        params![&license.id, account_login, account_server],
        |row| row.get(0),
    )?;
    if duplicate > 0 {
        return Err(AppError::Conflict(
            "This account is already activated for this license".into(),
        ));
    }

    let current: i64 = tx.query_row(
        "SELECT COUNT(*) FROM activations WHERE license_id = ?1 AND is_active = 1",
        params![&license.id],
        |row| row.get(0),
    )?;
    if current >= product.max_activations {
        return Err(AppError::QuotaExceeded(format!(
            "Activation limit reached ({}/{}). Purchase another copy for more activations.",
            current, product.max_activations
        )));
    }

    let id = gen_id();
    let now = now();
    tx.execute(
        "INSERT INTO activations (id, license_id, account_login, account_server, is_active, activated_at, deactivated_at, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, NULL, ?6)",
        params![&id, &license.id, account_login, account_server, now, now],
    )?;
    tx.commit()?;

    tracing::info!(
        license_id = %license.license_id,
        account_login = %account_login,
        account_server = %account_server,
        "activated account"
    );

    Ok(Activation {
        id,
        license_id: license.id,
        account_login: account_login.to_string(),
        account_server: account_server.to_string(),
        is_active: true,
        activated_at: now,
        deactivated_at: None,
        created_at: now,
    })
}

/// Logically deactivate an activation, freeing one quota slot.
/// Idempotent: deactivating an already-inactive activation is a no-op.
pub fn deactivate_activation(conn: &Connection, activation_id: &str) -> Result<()> {
    let existing: Option<Activation> = query_one(
        conn,
        &format!("SELECT {} FROM activations WHERE id = ?1", ACTIVATION_COLS),
        &[&activation_id],
    )?;
    let Some(activation) = existing else {
        return Err(AppError::NotFound("Activation not found".into()));
    };

    if !activation.is_active {
        return Ok(());
    }

    conn.execute(
        "UPDATE activations SET is_active = 0, deactivated_at = ?1 WHERE id = ?2 AND is_active = 1",
        params![now(), activation_id],
    )?;
    Ok(())
}

/// Physically remove a deactivated activation. Administrative use only;
/// normal deactivation keeps the row for history.
pub fn purge_activation(conn: &Connection, activation_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM activations WHERE id = ?1 AND is_active = 0",
        params![activation_id],
    )?;
    Ok(deleted > 0)
}

pub fn list_activations_for_license(
    conn: &Connection,
    license_row_id: &str,
) -> Result<Vec<Activation>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM activations WHERE license_id = ?1 ORDER BY created_at DESC",
            ACTIVATION_COLS
        ),
        &[&license_row_id],
    )
}

pub fn list_active_activations(conn: &Connection, license_row_id: &str) -> Result<Vec<Activation>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM activations WHERE license_id = ?1 AND is_active = 1 ORDER BY activated_at ASC",
            ACTIVATION_COLS
        ),
        &[&license_row_id],
    )
}

pub fn count_active_activations(conn: &Connection, license_row_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM activations WHERE license_id = ?1 AND is_active = 1",
        params![license_row_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Full activation summary for a license, for the listing endpoint and the
/// verifier's license_info payload.
pub fn activation_summary(conn: &Connection, license_id: &str) -> Result<ActivationSummary> {
    let license = get_license_by_license_id(conn, license_id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;
    let product = get_product_by_id(conn, &license.product_id)?
        .ok_or_else(|| AppError::Internal("Product not found for license".into()))?;
    let activations = list_activations_for_license(conn, &license.id)?;
    let current_activations = count_active_activations(conn, &license.id)?;

    Ok(ActivationSummary {
        license,
        product,
        current_activations,
        activations,
    })
}

// ============ Verification ============

/// Check whether a (license_id, account) pair is currently authorized.
///
/// Returns Ok(None) on every failure path: unknown license, inactive or
/// expired license, or account not among the active activations. Callers log
/// the distinction; the wire response must not.
pub fn verify_account(
    conn: &Connection,
    license_id: &str,
    account_login: &str,
    account_server: &str,
) -> Result<Option<ActivationSummary>> {
    let Some(license) = get_license_by_license_id(conn, license_id)? else {
        tracing::debug!(license_id = %license_id, "verify: unknown license");
        return Ok(None);
    };

    if !expiry::is_valid(&license) {
        tracing::debug!(license_id = %license_id, "verify: license inactive or expired");
        return Ok(None);
    }

    let active: i64 = conn.query_row(
        "SELECT COUNT(*) FROM activations
         WHERE license_id = ?1 AND account_login = ?2 AND account_server = ?3 AND is_active = 1",
        params![&license.id, account_login, account_server],
        |row| row.get(0),
    )?;
    if active == 0 {
        tracing::debug!(license_id = %license_id, "verify: account not authorized");
        return Ok(None);
    }

    activation_summary(conn, license_id).map(Some)
}
