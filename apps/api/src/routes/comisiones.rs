//! Commission report: the commission engine run over completed sales in
//! a date range.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::routes::AppState;
use tienda_core::commission;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub fecha_inicio: Option<DateTime<Utc>>,
    pub fecha_fin: Option<DateTime<Utc>>,
}

pub async fn report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Value>, ApiError> {
    let sales = state
        .db
        .sales()
        .sales_for_commission(query.fecha_inicio, query.fecha_fin)
        .await?;
    let rules = state.db.commission_rules().list_active().await?;
    let summaries = commission::accrue(&sales, &rules);
    Ok(Json(json!({ "data": summaries })))
}
