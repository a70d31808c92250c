//! Commission rule storage. The accrual math lives in
//! `tienda_core::commission`; this side just keeps the rule list.

use sqlx::SqlitePool;

use crate::error::DbResult;
use tienda_core::CommissionRule;

#[derive(Debug, Clone)]
pub struct CommissionRuleRepository {
    pool: SqlitePool,
}

impl CommissionRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRuleRepository { pool }
    }

    /// Active rules only. Validity windows are evaluated per sale at
    /// accrual time, not here.
    pub async fn list_active(&self) -> DbResult<Vec<CommissionRule>> {
        let rows = sqlx::query_as::<_, CommissionRule>(
            "SELECT id, name, kind, value, scope, reference_id, valid_from, valid_until,
                    is_active, created_at
             FROM commission_rules
             WHERE is_active = 1
             ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create(&self, rule: &CommissionRule) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO commission_rules
                 (id, name, kind, value, scope, reference_id, valid_from, valid_until,
                  is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(rule.kind)
        .bind(rule.value)
        .bind(rule.scope)
        .bind(rule.reference_id.as_deref())
        .bind(rule.valid_from)
        .bind(rule.valid_until)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
