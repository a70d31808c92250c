//! Variant catalog access.
//!
//! The sale path only ever needs two things from the catalog: resolve a
//! variant by id, and the sellable search the point-of-sale screen uses
//! (active variants with global stock on hand).

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use tienda_core::Variant;

/// A search hit: catalog fields plus the global counter, ready for the
/// point-of-sale picker.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SellableVariant {
    pub id: String,
    pub product_id: String,
    pub category_id: Option<String>,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub stock_global: i64,
}

#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Variant> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_tx(&mut *conn, id).await
    }

    pub async fn get_by_id_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Variant> {
        sqlx::query_as::<_, Variant>(
            "SELECT id, product_id, category_id, sku, name, price_cents, is_active,
                    created_at, updated_at
             FROM variants WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Variant", id))
    }

    pub async fn create(&self, variant: &Variant) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO variants
                 (id, product_id, category_id, sku, name, price_cents, is_active,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(variant.category_id.as_deref())
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.price_cents)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE variants SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(is_active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }
        Ok(())
    }

    /// Case-insensitive substring search over sku and name, restricted to
    /// active variants with global stock on hand. Sorted by sku for a
    /// stable picker order.
    pub async fn search_sellable(&self, query: &str, limit: u32) -> DbResult<Vec<SellableVariant>> {
        let pattern = format!("%{}%", query.trim());
        let rows = sqlx::query_as::<_, SellableVariant>(
            "SELECT v.id, v.product_id, v.category_id, v.sku, v.name, v.price_cents,
                    gi.quantity_available AS stock_global
             FROM variants v
             JOIN global_inventory gi ON gi.variant_id = v.id
             WHERE v.is_active = 1
               AND gi.quantity_available > 0
               AND (v.sku LIKE ?1 OR v.name LIKE ?1)
             ORDER BY v.sku
             LIMIT ?2",
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
