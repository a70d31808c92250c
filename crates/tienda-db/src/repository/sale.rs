//! Sale reads.
//!
//! All sale WRITES go through the coordinator so inventory, folio and
//! code-usage updates share one transaction. This repository covers the
//! read side: lookups, the filtered history listing and the completed-sale
//! feed the commission report consumes.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use tienda_core::{
    commission::{CommissionLine, CommissionSale},
    PaymentMap, Sale, SaleItem, SaleStatus,
};

/// Database shape of a sale header. `payments` persists as a JSON object
/// keyed by payment-method label.
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    folio: String,
    store_id: String,
    actor_id: String,
    status: SaleStatus,
    subtotal_cents: i64,
    discount_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    payments: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    discount_code_id: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SaleRow {
    fn into_sale(self) -> DbResult<Sale> {
        let payments: PaymentMap =
            serde_json::from_str(&self.payments).map_err(|e| DbError::CorruptValue {
                entity: "Sale",
                field: "payments",
                message: e.to_string(),
            })?;
        Ok(Sale {
            id: self.id,
            folio: self.folio,
            store_id: self.store_id,
            actor_id: self.actor_id,
            status: self.status,
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            payments,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            discount_code_id: self.discount_code_id,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}

const SELECT_SALE: &str = "SELECT id, folio, store_id, actor_id, status, subtotal_cents,
        discount_cents, tax_cents, total_cents, payments, customer_name,
        customer_phone, discount_code_id, notes, created_at, updated_at,
        completed_at
 FROM sales";

/// History listing filters. All optional and combinable.
#[derive(Debug, Clone, Default)]
pub struct SaleFilters {
    pub fecha_inicio: Option<DateTime<Utc>>,
    pub fecha_fin: Option<DateTime<Utc>>,
    pub estado: Option<SaleStatus>,
    /// Matches sales where this payment-method label carries any amount.
    pub metodo_pago: Option<String>,
    pub store_id: Option<String>,
    pub actor_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl SaleFilters {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(desde) = self.fecha_inicio {
            qb.push(" AND created_at >= ").push_bind(desde);
        }
        if let Some(hasta) = self.fecha_fin {
            qb.push(" AND created_at <= ").push_bind(hasta);
        }
        if let Some(estado) = self.estado {
            qb.push(" AND status = ").push_bind(estado);
        }
        if let Some(ref metodo) = self.metodo_pago {
            qb.push(" AND json_extract(payments, '$.' || ")
                .push_bind(metodo.clone())
                .push(") IS NOT NULL");
        }
        if let Some(ref store) = self.store_id {
            qb.push(" AND store_id = ").push_bind(store.clone());
        }
        if let Some(ref actor) = self.actor_id {
            qb.push(" AND actor_id = ").push_bind(actor.clone());
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Sale> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_tx(&mut *conn, id).await
    }

    pub async fn get_by_id_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
        let sql = format!("{SELECT_SALE} WHERE id = ?1");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;
        row.into_sale()
    }

    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_items_tx(&mut *conn, sale_id).await
    }

    pub async fn get_items_tx(
        conn: &mut SqliteConnection,
        sale_id: &str,
    ) -> DbResult<Vec<SaleItem>> {
        let rows = sqlx::query_as::<_, SaleItem>(
            "SELECT id, sale_id, variant_id, sku_snapshot, description, quantity,
                    unit_price_cents, subtotal_cents
             FROM sale_items WHERE sale_id = ?1 ORDER BY id",
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Filtered, paginated history. Returns the page plus the unpaginated
    /// match count for the pagination envelope.
    pub async fn list(&self, filters: &SaleFilters) -> DbResult<(Vec<Sale>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM sales");
        filters.push_where(&mut count_qb);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new(SELECT_SALE);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filters.limit.max(1))
            .push(" OFFSET ")
            .push_bind(filters.offset);

        let rows: Vec<SaleRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let sales = rows
            .into_iter()
            .map(SaleRow::into_sale)
            .collect::<DbResult<Vec<_>>>()?;
        Ok((sales, total))
    }

    /// Completed sales in a window, joined to their line scope data, in
    /// the shape the commission accrual consumes. Cancelled and pending
    /// sales never accrue.
    pub async fn sales_for_commission(
        &self,
        desde: Option<DateTime<Utc>>,
        hasta: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<CommissionSale>> {
        let mut qb = QueryBuilder::new(
            "SELECT id, actor_id, total_cents, completed_at
             FROM sales WHERE status = 'completada' AND completed_at IS NOT NULL",
        );
        if let Some(desde) = desde {
            qb.push(" AND completed_at >= ").push_bind(desde);
        }
        if let Some(hasta) = hasta {
            qb.push(" AND completed_at <= ").push_bind(hasta);
        }
        qb.push(" ORDER BY completed_at");

        #[derive(sqlx::FromRow)]
        struct HeaderRow {
            id: String,
            actor_id: String,
            total_cents: i64,
            completed_at: DateTime<Utc>,
        }

        let headers: Vec<HeaderRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut sales = Vec::with_capacity(headers.len());
        for header in headers {
            let lines = sqlx::query_as::<_, (Option<String>, Option<String>)>(
                "SELECT v.product_id, v.category_id
                 FROM sale_items si
                 LEFT JOIN variants v ON v.id = si.variant_id
                 WHERE si.sale_id = ?1",
            )
            .bind(&header.id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(product_id, category_id)| CommissionLine { product_id, category_id })
            .collect();

            sales.push(CommissionSale {
                sale_id: header.id,
                actor_id: header.actor_id,
                total_cents: header.total_cents,
                completed_at: header.completed_at,
                lines,
            });
        }
        Ok(sales)
    }
}
