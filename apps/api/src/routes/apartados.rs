//! Layaway (apartado) endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Identity;
use crate::error::ApiError;
use crate::routes::AppState;
use tienda_core::LayawayStatus;
use tienda_db::{CreateLayaway, LayawayReceipt, SaleLine};

#[derive(Debug, Deserialize)]
pub struct CreateLayawayBody {
    pub items: Vec<SaleLine>,
    pub sucursal_id: Option<String>,
    pub cliente_nombre: Option<String>,
    pub cliente_telefono: Option<String>,
    pub notas: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateLayawayBody>,
) -> Result<(StatusCode, Json<LayawayReceipt>), ApiError> {
    let receipt = state
        .db
        .coordinator()
        .create_layaway(CreateLayaway {
            store_id: body.sucursal_id,
            actor_id: identity.user_id,
            actor_home_store: identity.home_store_id,
            lines: body.items,
            customer_name: body.cliente_nombre,
            customer_phone: body.cliente_telefono,
            notes: body.notas,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let layaway = state.db.layaways().get_by_id(&id).await?;
    let items = state.db.layaways().get_items(&id).await?;
    let abonos = state.db.layaways().get_deposits(&id).await?;
    Ok(Json(json!({
        "apartado": layaway,
        "saldo_pendiente_cents": layaway.saldo_pendiente_cents(),
        "items": items,
        "abonos": abonos,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DepositBody {
    pub monto_cents: i64,
    pub metodo_pago: String,
}

pub async fn deposit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<DepositBody>,
) -> Result<Json<Value>, ApiError> {
    let layaway = state
        .db
        .coordinator()
        .add_deposit(&id, body.monto_cents, &body.metodo_pago, &identity.user_id)
        .await?;
    Ok(Json(json!({
        "apartado": layaway,
        "saldo_pendiente_cents": layaway.saldo_pendiente_cents(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
    pub estado: LayawayStatus,
}

pub async fn set_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<SetStatusBody>,
) -> Result<Json<Value>, ApiError> {
    // Cancelling an apartado releases reserved stock; keep that gated.
    if body.estado == LayawayStatus::Cancelado && !identity.role.can_manage() {
        return Err(ApiError::Forbidden);
    }
    let layaway = state
        .db
        .coordinator()
        .set_layaway_status(&id, body.estado, &identity.user_id)
        .await?;
    Ok(Json(json!({ "apartado": layaway })))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceItemsBody {
    pub items: Vec<SaleLine>,
}

pub async fn replace_items(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<ReplaceItemsBody>,
) -> Result<Json<Value>, ApiError> {
    let layaway = state
        .db
        .coordinator()
        .replace_layaway_items(&id, body.items, &identity.user_id)
        .await?;
    let items = state.db.layaways().get_items(&id).await?;
    Ok(Json(json!({ "apartado": layaway, "items": items })))
}
