//! Layaway (apartado) reads.
//!
//! As with sales, every layaway WRITE runs through the coordinator; this
//! repository is lookups only.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use tienda_core::{Layaway, LayawayDeposit, LayawayItem};

const SELECT_LAYAWAY: &str = "SELECT id, folio, store_id, actor_id, status, customer_name,
        customer_phone, total_cents, total_abonado_cents, notes, delivered_at,
        created_at, updated_at
 FROM layaways";

#[derive(Debug, Clone)]
pub struct LayawayRepository {
    pool: SqlitePool,
}

impl LayawayRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LayawayRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Layaway> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_tx(&mut *conn, id).await
    }

    pub async fn get_by_id_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Layaway> {
        let sql = format!("{SELECT_LAYAWAY} WHERE id = ?1");
        sqlx::query_as::<_, Layaway>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Layaway", id))
    }

    pub async fn get_items(&self, layaway_id: &str) -> DbResult<Vec<LayawayItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_items_tx(&mut *conn, layaway_id).await
    }

    pub async fn get_items_tx(
        conn: &mut SqliteConnection,
        layaway_id: &str,
    ) -> DbResult<Vec<LayawayItem>> {
        let rows = sqlx::query_as::<_, LayawayItem>(
            "SELECT id, layaway_id, variant_id, sku_snapshot, description, quantity,
                    unit_price_cents, subtotal_cents
             FROM layaway_items WHERE layaway_id = ?1 ORDER BY id",
        )
        .bind(layaway_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Deposit receipts, oldest first.
    pub async fn get_deposits(&self, layaway_id: &str) -> DbResult<Vec<LayawayDeposit>> {
        let rows = sqlx::query_as::<_, LayawayDeposit>(
            "SELECT id, layaway_id, sale_id, amount_cents, method, actor_id, created_at
             FROM layaway_deposits WHERE layaway_id = ?1 ORDER BY created_at",
        )
        .bind(layaway_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
