//! HTTP routes for jupycell server.
//!
//! # Routes
//!
//! - `GET  /health`       - liveness probe
//! - `POST /start`        - start a kernel, returns `{kernel_id}`
//! - `POST /cell`         - add, edit, run, delete or run_all cells
//! - `GET  /cell_outputs` - stored outputs of one cell
//! - `GET  /cells`        - all cells of a kernel
//! - `POST /close`        - shut a kernel down

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::Json,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::error::{ServerError, ServerResult};
use crate::protocol::{
    CellCommand, CellRequest, CellResponse, CellsResponse, KernelRef, OutputsQuery,
    OutputsResponse, RunAllResponse, StartResponse, StatusResponse,
};
use crate::registry::SessionRegistry;

/// Application state shared across handlers.
pub struct AppState {
    /// Live kernel sessions.
    pub registry: SessionRegistry,
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/start", post(start_handler))
        .route("/cell", post(cell_handler))
        .route("/cell_outputs", get(cell_outputs_handler))
        .route("/cells", get(cells_handler))
        .route("/close", post(close_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "kernels": state.registry.len().await,
    }))
}

/// Start a new kernel.
async fn start_handler(State(state): State<Arc<AppState>>) -> ServerResult<Json<StartResponse>> {
    let kernel_id = state.registry.create().await?;
    Ok(Json(StartResponse { kernel_id }))
}

/// Apply a cell operation.
async fn cell_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CellRequest>, JsonRejection>,
) -> ServerResult<Json<CellResponse>> {
    let Json(request) = payload.map_err(|e| ServerError::Validation(e.body_text()))?;

    let session = state.registry.lookup(request.kernel_id).await?;
    let command = request.into_command()?;

    let response = match command {
        CellCommand::Add { number, code } => {
            session.add_cell(number, code).await?;
            CellResponse::Status(StatusResponse::new(format!("Cell {} added.", number)))
        }
        CellCommand::Edit { number, code } => {
            session.edit_cell(number, code).await?;
            CellResponse::Status(StatusResponse::new(format!("Cell {} updated.", number)))
        }
        CellCommand::Delete { number } => {
            session.delete_cell(number).await?;
            CellResponse::Status(StatusResponse::new(format!("Cell {} deleted.", number)))
        }
        CellCommand::Run { number } => {
            let execution = session.run_cell(number).await?;
            CellResponse::Outputs(OutputsResponse {
                outputs: execution.outputs,
                completion: Some(execution.completion),
            })
        }
        CellCommand::RunAll => CellResponse::RunAll(RunAllResponse {
            outputs: session.run_all().await?,
        }),
    };

    Ok(Json(response))
}

/// Stored outputs of one cell.
async fn cell_outputs_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<OutputsQuery>, QueryRejection>,
) -> ServerResult<Json<OutputsResponse>> {
    let Query(query) = query.map_err(|e| ServerError::Validation(e.body_text()))?;

    let session = state.registry.lookup(query.kernel_id).await?;
    Ok(Json(OutputsResponse {
        outputs: session.cell_outputs(query.cell_number).await?,
        completion: None,
    }))
}

/// All cells of a kernel.
async fn cells_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<KernelRef>, QueryRejection>,
) -> ServerResult<Json<CellsResponse>> {
    let Query(query) = query.map_err(|e| ServerError::Validation(e.body_text()))?;

    let session = state.registry.lookup(query.kernel_id).await?;
    Ok(Json(CellsResponse {
        cells: session.cells().await,
    }))
}

/// Shut a kernel down.
async fn close_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<KernelRef>, JsonRejection>,
) -> ServerResult<Json<StatusResponse>> {
    let Json(request) = payload.map_err(|e| ServerError::Validation(e.body_text()))?;

    state.registry.close(request.kernel_id).await?;
    Ok(Json(StatusResponse::new(format!(
        "Kernel {} closed.",
        request.kernel_id
    ))))
}
