//! Inventory endpoints. The mutating ones are manager territory.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::routes::AppState;
use tienda_core::MovementKind;
use tienda_db::MovementRequest;

#[derive(Debug, Deserialize)]
pub struct MovementBody {
    pub tipo: MovementKind,
    pub variant_id: String,
    /// Omitted = the global pool.
    pub sucursal_id: Option<String>,
    pub cantidad: i64,
    pub motivo: Option<String>,
}

pub async fn movement(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<MovementBody>,
) -> Result<Json<Value>, ApiError> {
    if !identity.role.can_manage() {
        return Err(ApiError::Forbidden);
    }
    let new_qty = state
        .db
        .inventory()
        .apply_movement(&MovementRequest {
            kind: body.tipo,
            variant_id: body.variant_id.clone(),
            store_id: body.sucursal_id,
            quantity: body.cantidad,
            actor_id: identity.user_id,
            reason: body.motivo,
        })
        .await?;
    Ok(Json(json!({ "variant_id": body.variant_id, "cantidad_nueva": new_qty })))
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub variant_id: String,
    pub origen: String,
    pub destino: String,
    pub cantidad: i64,
    pub motivo: Option<String>,
}

pub async fn transfer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<TransferBody>,
) -> Result<Json<Value>, ApiError> {
    if !identity.role.can_manage() {
        return Err(ApiError::Forbidden);
    }
    state
        .db
        .inventory()
        .transfer(
            &body.variant_id,
            &body.origen,
            &body.destino,
            body.cantidad,
            &identity.user_id,
            body.motivo.as_deref(),
        )
        .await?;
    Ok(Json(json!({
        "variant_id": body.variant_id,
        "origen": body.origen,
        "destino": body.destino,
        "cantidad": body.cantidad,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub sucursal_id: Option<String>,
    pub movimientos: Option<u32>,
}

pub async fn snapshot(
    State(state): State<AppState>,
    Path(variant_id): Path<String>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Json<Value>, ApiError> {
    // Surfaces VariantNotFound as a 404 before reading the counters.
    state.db.variants().get_by_id(&variant_id).await?;

    let snapshot = state
        .db
        .inventory()
        .stock_snapshot(&variant_id, query.sucursal_id.as_deref())
        .await?;
    let movements = state
        .db
        .inventory()
        .movements(&variant_id, query.movimientos.unwrap_or(20).min(200))
        .await?;
    Ok(Json(json!({
        "variant_id": variant_id,
        "global": snapshot.global,
        "sucursal": snapshot.store,
        "movimientos": movements,
    })))
}
