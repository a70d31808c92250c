//! Discount code storage.
//!
//! The validation logic itself lives in `tienda_core::promotion`; this
//! repository only loads codes, counts prior uses and records new ones.
//! All `_tx` functions run inside the coordinator's sale transaction so a
//! rolled-back sale never burns a use.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::{CodeUsage, CoreError, DiscountCode, DiscountScope, RateKind};

/// Database shape of a code. `reference_ids` persists as a JSON array.
#[derive(Debug, sqlx::FromRow)]
struct DiscountCodeRow {
    id: String,
    code: String,
    kind: RateKind,
    value: i64,
    min_purchase_cents: Option<i64>,
    max_discount_cents: Option<i64>,
    max_uses: Option<i64>,
    max_uses_per_customer: Option<i64>,
    scope: DiscountScope,
    reference_ids: String,
    valid_from: Option<chrono::DateTime<Utc>>,
    valid_until: Option<chrono::DateTime<Utc>>,
    is_active: bool,
    times_used: i64,
}

impl DiscountCodeRow {
    fn into_code(self) -> DbResult<DiscountCode> {
        let reference_ids: Vec<String> =
            serde_json::from_str(&self.reference_ids).map_err(|e| DbError::CorruptValue {
                entity: "DiscountCode",
                field: "reference_ids",
                message: e.to_string(),
            })?;
        Ok(DiscountCode {
            id: self.id,
            code: self.code,
            kind: self.kind,
            value: self.value,
            min_purchase_cents: self.min_purchase_cents,
            max_discount_cents: self.max_discount_cents,
            max_uses: self.max_uses,
            max_uses_per_customer: self.max_uses_per_customer,
            scope: self.scope,
            reference_ids,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            is_active: self.is_active,
            times_used: self.times_used,
        })
    }
}

const SELECT_CODE: &str = "SELECT id, code, kind, value, min_purchase_cents, max_discount_cents,
        max_uses, max_uses_per_customer, scope, reference_ids, valid_from,
        valid_until, is_active, times_used
 FROM discount_codes";

#[derive(Debug, Clone)]
pub struct DiscountCodeRepository {
    pool: SqlitePool,
}

impl DiscountCodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountCodeRepository { pool }
    }

    /// Lookup is case-insensitive on the code label.
    pub async fn get_by_code(&self, code: &str) -> DbResult<DiscountCode> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_code_tx(&mut *conn, code).await
    }

    pub async fn get_by_code_tx(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> DbResult<DiscountCode> {
        let sql = format!("{SELECT_CODE} WHERE code = ?1 COLLATE NOCASE");
        let row = sqlx::query_as::<_, DiscountCodeRow>(&sql)
            .bind(code.trim())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::Domain(CoreError::CodeNotFound(code.to_string())))?;
        row.into_code()
    }

    /// Prior-use counts feeding the cap checks: the global counter plus
    /// how many times this customer (by phone snapshot) has used the code.
    pub async fn usage_counts_tx(
        conn: &mut SqliteConnection,
        code_id: &str,
        customer_phone: Option<&str>,
    ) -> DbResult<CodeUsage> {
        let total_uses: i64 =
            sqlx::query_scalar("SELECT times_used FROM discount_codes WHERE id = ?1")
                .bind(code_id)
                .fetch_one(&mut *conn)
                .await?;

        let customer_uses = match customer_phone {
            Some(phone) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM discount_code_uses
                     WHERE code_id = ?1 AND customer_phone = ?2",
                )
                .bind(code_id)
                .bind(phone)
                .fetch_one(&mut *conn)
                .await?
            }
            None => 0,
        };

        Ok(CodeUsage { total_uses, customer_uses })
    }

    /// Burns one use: appends the use row and bumps the global counter.
    pub async fn record_use_tx(
        conn: &mut SqliteConnection,
        code_id: &str,
        sale_id: &str,
        customer_phone: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO discount_code_uses (id, code_id, sale_id, customer_phone, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(code_id)
        .bind(sale_id)
        .bind(customer_phone)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        sqlx::query("UPDATE discount_codes SET times_used = times_used + 1 WHERE id = ?1")
            .bind(code_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn create(&self, code: &DiscountCode) -> DbResult<()> {
        let reference_ids = serde_json::to_string(&code.reference_ids).map_err(|e| {
            DbError::Internal(format!("serializing reference_ids: {e}"))
        })?;
        sqlx::query(
            "INSERT INTO discount_codes
                 (id, code, kind, value, min_purchase_cents, max_discount_cents,
                  max_uses, max_uses_per_customer, scope, reference_ids,
                  valid_from, valid_until, is_active, times_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(&code.id)
        .bind(&code.code)
        .bind(code.kind)
        .bind(code.value)
        .bind(code.min_purchase_cents)
        .bind(code.max_discount_cents)
        .bind(code.max_uses)
        .bind(code.max_uses_per_customer)
        .bind(code.scope)
        .bind(reference_ids)
        .bind(code.valid_from)
        .bind(code.valid_until)
        .bind(code.is_active)
        .bind(code.times_used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
