use anyhow::Result;
use sqlx::SqlitePool;

use lost_found_core::store::ITEMS_COLLECTION;

use crate::config::Config;
use crate::db;

/// Create the catalogue schema in the configured database. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // rowid order is the store's result order
    let create_items = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {items} (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            image_url TEXT NOT NULL,
            date_added INTEGER NOT NULL
        )
        "#,
        items = ITEMS_COLLECTION
    );
    sqlx::query(&create_items).execute(pool).await?;

    let create_labels = format!(
        r#"
        CREATE TABLE IF NOT EXISTS item_labels (
            item_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            label TEXT NOT NULL,
            PRIMARY KEY (item_id, position),
            FOREIGN KEY (item_id) REFERENCES {items}(id)
        )
        "#,
        items = ITEMS_COLLECTION
    );
    sqlx::query(&create_labels).execute(pool).await?;

    for column in ["name", "category"] {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS idx_{items}_{column} ON {items}({column})",
            items = ITEMS_COLLECTION,
            column = column
        );
        sqlx::query(&sql).execute(pool).await?;
    }
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_labels_label ON item_labels(label)")
        .execute(pool)
        .await?;

    Ok(())
}
