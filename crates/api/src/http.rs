//! Thin read-only HTTP surface over `SystemService`. Intentionally narrow:
//! no auth, websockets, or GraphQL, those are out-of-scope gateway
//! concerns; this just demonstrates the query boundary over plain JSON.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use tablesql_core::{Address, ChainId, TableId, TxnHash};
use tablesql_storage::SystemService;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("storage error: {0}")]
    Storage(#[from] tablesql_storage::StorageError),
    #[error("invalid path parameter: {0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(service: Arc<SystemService>) -> Router {
    Router::new()
        .route("/chains/:chain_id/tables/:table_id", get(get_table_metadata))
        .route("/chains/:chain_id/tables/by-controller/:controller", get(get_tables_by_controller))
        .route("/chains/:chain_id/tables/by-structure/:structure", get(get_tables_by_structure))
        .route("/chains/:chain_id/schema/:physical_table_name", get(get_schema))
        .route("/chains/:chain_id/receipts/:txn_hash", get(get_receipt))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn get_table_metadata(
    State(service): State<Arc<SystemService>>,
    Path((chain_id, table_id)): Path<(u64, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let table_id = TableId::parse(&table_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let row = service
        .get_table_metadata(ChainId(chain_id), table_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!(row_to_json(&row))))
}

async fn get_tables_by_controller(
    State(service): State<Arc<SystemService>>,
    Path((chain_id, controller)): Path<(u64, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let controller = Address::from_hex(&controller).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let rows = service.get_tables_by_controller(ChainId(chain_id), controller).await?;
    Ok(Json(serde_json::json!(rows.iter().map(row_to_json).collect::<Vec<_>>())))
}

async fn get_tables_by_structure(
    State(service): State<Arc<SystemService>>,
    Path((chain_id, structure)): Path<(u64, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = service.get_tables_by_structure(ChainId(chain_id), structure).await?;
    Ok(Json(serde_json::json!(rows.iter().map(row_to_json).collect::<Vec<_>>())))
}

async fn get_schema(
    State(service): State<Arc<SystemService>>,
    Path((_chain_id, physical_table_name)): Path<(u64, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sql = service.get_schema_by_table_name(physical_table_name).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!({ "sql": sql })))
}

async fn get_receipt(
    State(service): State<Arc<SystemService>>,
    Path((chain_id, txn_hash)): Path<(u64, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let txn_hash = TxnHash::from_hex(&txn_hash);
    let receipt = service.get_receipt_by_txn_hash(ChainId(chain_id), txn_hash).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!({
        "chainId": receipt.chain_id,
        "txnHash": receipt.txn_hash,
        "blockNumber": receipt.block_number,
        "indexInBlock": receipt.index_in_block,
        "tableId": receipt.table_id,
        "error": receipt.error,
        "errorEventIdx": receipt.error_event_idx,
    })))
}

fn row_to_json(row: &tablesql_storage::registry::TableRow) -> serde_json::Value {
    serde_json::json!({
        "chainId": row.chain_id,
        "id": row.id,
        "controller": row.controller,
        "prefix": row.prefix,
        "structure": row.structure,
        "createdAt": row.created_at,
    })
}
