//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Items live in the items collection table; each label is a row in `item_labels` keyed by
//! `(item_id, position)` so insertion order survives a round trip.
//! Every query returns rows in `items.rowid` order, i.e. insertion order.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use lost_found_core::models::{Item, StoredItem};
use lost_found_core::store::{
    DocumentStore, Predicate, DEFAULT_MAX_ANY_OPERANDS, ITEMS_COLLECTION,
};

/// Item rows matching `filter`, in insertion order.
fn select_where(filter: &str) -> String {
    format!(
        "SELECT id, name, category, image_url, date_added FROM {} WHERE {} ORDER BY rowid",
        ITEMS_COLLECTION, filter
    )
}

pub struct SqliteItemStore {
    pool: SqlitePool,
    max_any_operands: usize,
}

impl SqliteItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_max_any_operands(pool, DEFAULT_MAX_ANY_OPERANDS)
    }

    pub fn with_max_any_operands(pool: SqlitePool, max_any_operands: usize) -> Self {
        Self {
            pool,
            max_any_operands,
        }
    }

    async fn labels_for(&self, item_id: &str) -> Result<Vec<String>> {
        let labels: Vec<String> =
            sqlx::query_scalar("SELECT label FROM item_labels WHERE item_id = ? ORDER BY position")
                .bind(item_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(labels)
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<StoredItem>> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let millis: i64 = row.get("date_added");
            let date_added = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| anyhow!("item {} has invalid date_added {}", id, millis))?;
            let labels = self.labels_for(&id).await?;
            out.push(StoredItem {
                item: Item {
                    name: row.get("name"),
                    category: row.get("category"),
                    image_url: row.get("image_url"),
                    date_added,
                    labels,
                },
                key: id,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl DocumentStore for SqliteItemStore {
    async fn query(&self, predicate: &Predicate) -> Result<Vec<StoredItem>> {
        let rows = match predicate {
            Predicate::Range {
                field,
                lower,
                upper,
            } => {
                let column = field.as_str();
                let filter = format!("{} >= ? AND {} <= ?", column, column);
                sqlx::query(&select_where(&filter))
                    .bind(lower)
                    .bind(upper)
                    .fetch_all(&self.pool)
                    .await?
            }
            Predicate::ArrayContains { value } => {
                let filter = "id IN (SELECT item_id FROM item_labels WHERE label = ?)";
                sqlx::query(&select_where(filter))
                    .bind(value)
                    .fetch_all(&self.pool)
                    .await?
            }
            Predicate::ArrayContainsAny { values } => {
                if values.is_empty() {
                    bail!("array-contains-any requires at least one value");
                }
                if values.len() > self.max_any_operands {
                    bail!(
                        "array-contains-any supports at most {} values, got {}",
                        self.max_any_operands,
                        values.len()
                    );
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                let filter = format!(
                    "id IN (SELECT item_id FROM item_labels WHERE label IN ({}))",
                    placeholders
                );
                let sql = select_where(&filter);
                let mut query = sqlx::query(&sql);
                for v in values {
                    query = query.bind(v);
                }
                query.fetch_all(&self.pool).await?
            }
        };

        self.hydrate(rows).await
    }

    async fn add(&self, item: &Item) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        let insert = format!(
            "INSERT INTO {} (id, name, category, image_url, date_added) VALUES (?, ?, ?, ?, ?)",
            ITEMS_COLLECTION
        );
        sqlx::query(&insert)
            .bind(&id)
            .bind(&item.name)
            .bind(&item.category)
            .bind(&item.image_url)
            .bind(item.date_added.timestamp_millis())
            .execute(&mut *tx)
            .await?;

        for (position, label) in item.labels.iter().enumerate() {
            sqlx::query("INSERT INTO item_labels (item_id, position, label) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(position as i64)
                .bind(label)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    fn max_any_operands(&self) -> usize {
        self.max_any_operands
    }
}
