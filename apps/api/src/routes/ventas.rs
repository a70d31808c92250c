//! Sale endpoints: creation (venta and preventa), history, detail,
//! cancellation, settlement and the point-of-sale variant search.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::routes::AppState;
use tienda_core::{validation, CoreError, PaymentMap, SaleStatus};
use tienda_db::{CreateSale, SaleFilters, SaleLine, SaleReceipt};

#[derive(Debug, Deserialize)]
pub struct CreateSaleBody {
    pub items: Vec<SaleLine>,
    #[serde(default)]
    pub pagos: PaymentMap,
    #[serde(default)]
    pub preventa: bool,
    pub codigo_descuento: Option<String>,
    pub iva_bps: Option<u32>,
    pub sucursal_id: Option<String>,
    pub cliente_nombre: Option<String>,
    pub cliente_telefono: Option<String>,
    pub notas: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateSaleBody>,
) -> Result<(StatusCode, Json<SaleReceipt>), ApiError> {
    let receipt = state
        .db
        .coordinator()
        .create_sale(CreateSale {
            store_id: body.sucursal_id,
            actor_id: identity.user_id,
            actor_home_store: identity.home_store_id,
            lines: body.items,
            payments: body.pagos,
            preventa: body.preventa,
            discount_code: body.codigo_descuento,
            tax_rate_bps: body.iva_bps,
            customer_name: body.cliente_nombre,
            customer_phone: body.cliente_telefono,
            notes: body.notas,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub fecha_inicio: Option<DateTime<Utc>>,
    pub fecha_fin: Option<DateTime<Utc>>,
    pub estado: Option<SaleStatus>,
    pub metodo_pago: Option<String>,
    pub sucursal_id: Option<String>,
    pub usuario_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);
    let filters = SaleFilters {
        fecha_inicio: query.fecha_inicio,
        fecha_fin: query.fecha_fin,
        estado: query.estado,
        metodo_pago: query.metodo_pago,
        store_id: query.sucursal_id,
        actor_id: query.usuario_id,
        limit,
        offset,
    };
    let (data, total) = state.db.sales().list(&filters).await?;
    Ok(Json(json!({
        "data": data,
        "pagination": { "total": total, "limit": limit, "offset": offset },
    })))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let sale = state.db.sales().get_by_id(&id).await?;
    let items = state.db.sales().get_items(&id).await?;
    Ok(Json(json!({ "venta": sale, "items": items })))
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelBody {
    pub motivo: Option<String>,
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> Result<Json<Value>, ApiError> {
    if !identity.role.can_manage() {
        return Err(ApiError::Forbidden);
    }
    let motivo = body.and_then(|Json(b)| b.motivo);
    let sale = state
        .db
        .coordinator()
        .cancel_sale(&id, &identity.user_id, motivo.as_deref())
        .await?;
    Ok(Json(json!({ "venta": sale })))
}

#[derive(Debug, Deserialize)]
pub struct SettleBody {
    pub pagos: PaymentMap,
}

pub async fn settle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SettleBody>,
) -> Result<Json<Value>, ApiError> {
    let sale = state.db.coordinator().settle_sale(&id, body.pagos).await?;
    Ok(Json(json!({ "venta": sale })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<u32>,
}

pub async fn search_variants(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let q = validation::validate_search_query(&query.q)
        .map_err(|e| ApiError::from(CoreError::Validation(e)))?;
    let limit = query.limit.unwrap_or(20).min(100);
    let hits = state.db.variants().search_sellable(&q, limit).await?;
    Ok(Json(json!({ "data": hits })))
}
