//! Folio counters.
//!
//! Each document series (`V` for ventas, `A` for apartados) keeps one row
//! in `folios`. Allocation is a single upsert-and-return statement so two
//! concurrent transactions can never mint the same number.

use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Allocates the next folio in a series, e.g. `V-000042`.
///
/// Must run inside the caller's transaction: if the enclosing work rolls
/// back, the number is released with it.
pub async fn next_folio(conn: &mut SqliteConnection, series: &str) -> DbResult<String> {
    let value: i64 = sqlx::query_scalar(
        "INSERT INTO folios (series, next_value) VALUES (?1, 2)
         ON CONFLICT (series) DO UPDATE SET next_value = next_value + 1
         RETURNING next_value - 1",
    )
    .bind(series)
    .fetch_one(&mut *conn)
    .await?;
    Ok(format!("{series}-{value:06}"))
}
