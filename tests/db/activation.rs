//! Activation quota and lifecycle tests

#[path = "../common/mod.rs"]
mod common;

use std::thread;

use common::*;
use rusqlite::params;
use tradekey::error::AppError;

#[test]
fn test_activation_quota_scenario() {
    // Product with max_activations = 2: two activations succeed, the third
    // fails with QuotaExceeded, availability counts down as slots fill.
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 2);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);

    queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("first activation should succeed");
    let summary = queries::activation_summary(&conn, &license.license_id).expect("summary failed");
    assert_eq!(summary.current_activations, 1);
    assert_eq!(summary.product.max_activations - summary.current_activations, 1);

    queries::activate_account(&mut conn, &license.license_id, "222", "ServerA")
        .expect("second activation should succeed");
    let summary = queries::activation_summary(&conn, &license.license_id).expect("summary failed");
    assert_eq!(summary.current_activations, 2);
    assert_eq!(summary.product.max_activations - summary.current_activations, 0);

    let result = queries::activate_account(&mut conn, &license.license_id, "333", "ServerA");
    assert!(
        matches!(result, Err(AppError::QuotaExceeded(_))),
        "third activation must exceed the quota"
    );
}

#[test]
fn test_duplicate_account_rejected() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 5);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);

    queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("first activation should succeed");
    let result = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA");
    assert!(
        matches!(result, Err(AppError::Conflict(_))),
        "same (login, server) twice must be rejected"
    );

    // Same login on a different server is a distinct installation.
    queries::activate_account(&mut conn, &license.license_id, "111", "ServerB")
        .expect("same login on another server should succeed");
}

#[test]
fn test_activate_unknown_license() {
    let mut conn = setup_test_db();

    let result = queries::activate_account(&mut conn, "LIC-MISSING1", "111", "ServerA");
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_activate_on_deactivated_license() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 2);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);
    queries::deactivate_license(&conn, &license.license_id).expect("deactivate failed");

    let result = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA");
    assert!(matches!(result, Err(AppError::Expired(_))));
}

#[test]
fn test_activate_on_expired_rental() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Scalper Robot", 2);
    let license = queries::issue_license(&mut conn, &rental_event("txn-1", &product.id, 30))
        .expect("issue failed");

    // Age the rental past its window; no stored transition is involved.
    conn.execute(
        "UPDATE licenses SET expires_at = 1000 WHERE id = ?1",
        params![&license.id],
    )
    .expect("update failed");

    let result = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA");
    assert!(
        matches!(result, Err(AppError::Expired(_))),
        "expired rental must not accept activations while still is_active"
    );
}

#[test]
fn test_deactivation_frees_a_slot() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 1);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);

    let activation = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation should succeed");

    let result = queries::activate_account(&mut conn, &license.license_id, "222", "ServerA");
    assert!(matches!(result, Err(AppError::QuotaExceeded(_))));

    queries::deactivate_activation(&conn, &activation.id).expect("deactivate failed");

    queries::activate_account(&mut conn, &license.license_id, "222", "ServerA")
        .expect("slot freed by deactivation should be reusable");

    // The deactivated row survives as history.
    let summary = queries::activation_summary(&conn, &license.license_id).expect("summary failed");
    assert_eq!(summary.activations.len(), 2);
    assert_eq!(summary.current_activations, 1);
}

#[test]
fn test_deactivate_is_idempotent() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 1);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);
    let activation = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation should succeed");

    queries::deactivate_activation(&conn, &activation.id).expect("first deactivate failed");
    queries::deactivate_activation(&conn, &activation.id)
        .expect("repeat deactivate must be a no-op, not an error");

    let result = queries::deactivate_activation(&conn, "no-such-activation");
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_reactivation_after_deactivation() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 2);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);

    let activation = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation should succeed");
    queries::deactivate_activation(&conn, &activation.id).expect("deactivate failed");

    // The partial unique index only covers live rows, so the same account
    // can come back with a fresh activation.
    queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("reactivating a deactivated account should succeed");
}

#[test]
fn test_purge_requires_prior_deactivation() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 2);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);
    let activation = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation should succeed");

    let purged = queries::purge_activation(&conn, &activation.id).expect("purge failed");
    assert!(!purged, "live activations must not be purged");

    queries::deactivate_activation(&conn, &activation.id).expect("deactivate failed");
    let purged = queries::purge_activation(&conn, &activation.id).expect("purge failed");
    assert!(purged);

    let summary = queries::activation_summary(&conn, &license.license_id).expect("summary failed");
    assert!(summary.activations.is_empty(), "purge removes the row");
}

#[test]
fn test_current_activations_is_derived_not_stored() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 3);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);

    let a = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation failed");
    queries::activate_account(&mut conn, &license.license_id, "222", "ServerA")
        .expect("activation failed");
    queries::deactivate_activation(&conn, &a.id).expect("deactivate failed");

    // Count always reflects the live rows.
    assert_eq!(
        queries::count_active_activations(&conn, &license.id).expect("count failed"),
        1
    );
    let summary = queries::activation_summary(&conn, &license.license_id).expect("summary failed");
    assert_eq!(summary.current_activations, 1);
}

#[test]
fn test_concurrent_activations_never_exceed_quota() {
    // The hard correctness property: K concurrent attempts against one
    // license succeed exactly max_activations times; every other attempt
    // fails with QuotaExceeded and the final live count equals the cap.
    let (_dir, pool) = setup_test_pool();

    let max_activations = 3;
    let attempts = 8;

    let license_id = {
        let mut conn = pool.get().expect("pool get failed");
        let product = create_test_product(&conn, "Trend Robot", max_activations);
        issue_test_license(&mut conn, "txn-1", &product.id).license_id
    };

    let handles: Vec<_> = (0..attempts)
        .map(|i| {
            let pool = pool.clone();
            let license_id = license_id.clone();
            thread::spawn(move || {
                let mut conn = pool.get().expect("pool get failed");
                queries::activate_account(
                    &mut conn,
                    &license_id,
                    &format!("login-{}", i),
                    "ServerA",
                )
            })
        })
        .collect();

    let mut succeeded = 0;
    let mut quota_exceeded = 0;
    for handle in handles {
        match handle.join().expect("thread panicked") {
            Ok(_) => succeeded += 1,
            Err(AppError::QuotaExceeded(_)) => quota_exceeded += 1,
            Err(e) => panic!("unexpected activation error: {}", e),
        }
    }

    assert_eq!(succeeded, max_activations, "exactly the quota may succeed");
    assert_eq!(quota_exceeded, attempts - max_activations);

    let conn = pool.get().expect("pool get failed");
    let license = queries::get_license_by_license_id(&conn, &license_id)
        .expect("query failed")
        .expect("license missing");
    assert_eq!(
        queries::count_active_activations(&conn, &license.id).expect("count failed"),
        max_activations
    );
}
