use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Products (catalog entries; max_activations is the per-license quota)
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            max_activations INTEGER NOT NULL CHECK (max_activations >= 1),
            created_at INTEGER NOT NULL
        );

        -- Licenses (one per completed purchase of a product)
        -- UNIQUE(transaction_id, product_id) makes issuance idempotent under
        -- at-least-once event delivery.
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            license_id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            product_id TEXT NOT NULL REFERENCES products(id),
            transaction_id TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_rental INTEGER NOT NULL DEFAULT 0,
            expires_at INTEGER,
            created_at INTEGER NOT NULL,

            UNIQUE(transaction_id, product_id)
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_user ON licenses(user_id);
        CREATE INDEX IF NOT EXISTS idx_licenses_display ON licenses(license_id);

        -- Activations (a license bound to one trading account)
        -- Deactivation is logical: is_active = 0 keeps the history row.
        CREATE TABLE IF NOT EXISTS activations (
            id TEXT PRIMARY KEY,
            license_id TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
            account_login TEXT NOT NULL,
            account_server TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            activated_at INTEGER NOT NULL,
            deactivated_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_activations_license ON activations(license_id);
        -- The store itself rejects two live activations of the same account
        -- on one license, independent of application-level checks.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_activations_account_unique
            ON activations(license_id, account_login, account_server)
            WHERE is_active = 1;
        "#,
    )?;

    Ok(())
}
