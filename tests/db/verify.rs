//! Account verification tests
//!
//! The verifier collapses every failure into Ok(None); which part of the
//! (license_id, account) tuple was wrong is never observable from the result.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use rusqlite::params;

#[test]
fn test_verify_authorized_account() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 2);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);
    queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation failed");

    let summary = queries::verify_account(&conn, &license.license_id, "111", "ServerA")
        .expect("verify failed")
        .expect("account should be authorized");

    assert_eq!(summary.license.license_id, license.license_id);
    assert_eq!(summary.product.name, "Trend Robot");
    assert_eq!(summary.current_activations, 1);
}

#[test]
fn test_verify_failure_paths_are_uniform() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 2);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);
    let activation = queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation failed");

    // Unknown license
    let result = queries::verify_account(&conn, "LIC-MISSING1", "111", "ServerA")
        .expect("verify failed");
    assert!(result.is_none());

    // Known license, account never activated
    let result = queries::verify_account(&conn, &license.license_id, "999", "ServerA")
        .expect("verify failed");
    assert!(result.is_none());

    // Wrong server for a known login
    let result = queries::verify_account(&conn, &license.license_id, "111", "ServerB")
        .expect("verify failed");
    assert!(result.is_none());

    // Deactivated account
    queries::deactivate_activation(&conn, &activation.id).expect("deactivate failed");
    let result = queries::verify_account(&conn, &license.license_id, "111", "ServerA")
        .expect("verify failed");
    assert!(result.is_none());
}

#[test]
fn test_verify_rejects_inactive_license() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Trend Robot", 2);
    let license = issue_test_license(&mut conn, "txn-1", &product.id);
    queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation failed");
    queries::deactivate_license(&conn, &license.license_id).expect("deactivate failed");

    let result = queries::verify_account(&conn, &license.license_id, "111", "ServerA")
        .expect("verify failed");
    assert!(result.is_none());
}

#[test]
fn test_verify_rejects_expired_rental() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Scalper Robot", 2);
    let license = queries::issue_license(&mut conn, &rental_event("txn-1", &product.id, 30))
        .expect("issue failed");
    queries::activate_account(&mut conn, &license.license_id, "111", "ServerA")
        .expect("activation failed");

    conn.execute(
        "UPDATE licenses SET expires_at = 1000 WHERE id = ?1",
        params![&license.id],
    )
    .expect("update failed");

    let result = queries::verify_account(&conn, &license.license_id, "111", "ServerA")
        .expect("verify failed");
    assert!(
        result.is_none(),
        "a rental past its window must fail verification with no deactivation step"
    );
}
