use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{info, warn};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::buffer::ConditionBuffer;
use crate::classify::ConditionLevel;
use crate::config::ServiceConfig;
use crate::db::{ConditionStore, DynError};
use crate::error::ApiError;
use crate::flush::spawn_flush_task;
use crate::graph::{build_graph, graph_day};
use crate::ingest::{submit_batch, IngestError};
use crate::models::{
    Device, GetIsuConditionResponse, GetIsuListResponse, PostIsuConditionRequest,
};
use crate::trend::{spawn_trend_task, TrendCache};
use crate::validity::ValidityCache;

/// State shared by every handler
///
/// The buffer and both caches are created here once per service instance.
pub struct AppState {
    pub store: ConditionStore,
    pub buffer: Arc<ConditionBuffer>,
    pub validity: ValidityCache<ConditionStore>,
    pub trend: Arc<TrendCache>,
    pub condition_page_limit: u32,
    pub user_header: HeaderName,
}

impl AppState {
    pub fn new(store: ConditionStore, config: &ServiceConfig) -> Result<Self, DynError> {
        let user_header = HeaderName::from_bytes(config.user_header.as_bytes())
            .map_err(|e| format!("Invalid user_header '{}': {}", config.user_header, e))?;

        Ok(Self {
            validity: ValidityCache::new(store.clone()),
            buffer: Arc::new(ConditionBuffer::new(
                config.buffer_capacity,
                config.overflow_policy,
            )),
            trend: Arc::new(TrendCache::new()),
            condition_page_limit: config.condition_page_limit,
            user_header,
            store,
        })
    }

    /// User id injected by the upstream auth layer
    fn user_id(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        headers
            .get(&self.user_header)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or(ApiError::Unauthorized)
    }

    async fn owned_device(&self, jia_isu_uuid: &str, user_id: &str) -> Result<Device, ApiError> {
        self.store
            .select_device_for_user(jia_isu_uuid, user_id)
            .await?
            .ok_or(ApiError::NotFound("isu"))
    }
}

/// Start the service and block until Ctrl-C
pub fn serve(config: ServiceConfig) -> Result<(), DynError> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

pub async fn run(config: ServiceConfig) -> Result<(), DynError> {
    let pool = crate::db::open_database(&config.database_path, config.max_connections).await?;
    crate::db::init_database_schema(&pool).await?;
    let store = ConditionStore::new(pool);

    let state = Arc::new(AppState::new(store, &config)?);

    let port = config.api_port;
    let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
        .await
        .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;

    info!("Listening on: http://[::]:{} (IPv4 + IPv6)", port);
    info!(
        "Database: {}, buffer capacity {} ({:?}), flush every {:?}, trend every {:?}",
        config.database_path.display(),
        config.buffer_capacity,
        config.overflow_policy,
        config.flush_interval(),
        config.trend_interval()
    );

    serve_until(listener, state, &config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutting down");
    })
    .await
}

/// Serve `state` on `listener` with the flush and trend workers until `signal` fires
///
/// The workers keep running while in-flight requests drain, so a submission
/// blocked on a full buffer still completes. They are stopped after the
/// server returns, and the flush worker persists what is left.
pub async fn serve_until<F>(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    config: &ServiceConfig,
    signal: F,
) -> Result<(), DynError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = CancellationToken::new();

    let flush_task = spawn_flush_task(
        state.buffer.clone(),
        state.store.clone(),
        config.flush_interval(),
        shutdown.clone(),
    );
    let trend_task = spawn_trend_task(
        state.trend.clone(),
        state.store.clone(),
        config.trend_interval(),
        shutdown.clone(),
    );

    let server = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(signal)
        .await;

    // stop the workers even if the server failed, so the final flush runs
    shutdown.cancel();
    let _ = flush_task.await;
    let _ = trend_task.await;

    server.map_err(|e| format!("Server error: {}", e))?;
    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/isu", get(get_isu_list))
        .route("/api/isu/{jia_isu_uuid}", get(get_isu))
        .route("/api/isu/{jia_isu_uuid}/graph", get(get_isu_graph))
        .route(
            "/api/condition/{jia_isu_uuid}",
            get(get_isu_conditions).post(post_isu_condition),
        )
        .route("/api/trend", get(get_trend))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// POST /api/condition/{jia_isu_uuid}
async fn post_isu_condition(
    State(state): State<Arc<AppState>>,
    Path(jia_isu_uuid): Path<String>,
    body: Result<Json<Vec<PostIsuConditionRequest>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(readings) =
        body.map_err(|e| ApiError::BadRequest(format!("bad request body: {}", e)))?;

    match submit_batch(&state.validity, &state.buffer, &jia_isu_uuid, readings).await {
        Ok(_) => Ok(StatusCode::ACCEPTED),
        Err(e) => {
            if let IngestError::MalformedCondition { enqueued, .. }
            | IngestError::BufferFull { enqueued, .. } = &e
            {
                if *enqueued > 0 {
                    warn!(
                        "Rejected submission for {} after enqueueing {} condition(s): {}",
                        jia_isu_uuid, enqueued, e
                    );
                }
            }
            Err(e.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConditionsQuery {
    end_time: Option<String>,
    condition_level: Option<String>,
    start_time: Option<String>,
}

fn parse_unix_param(name: &str, value: &str) -> Result<i64, ApiError> {
    value
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("bad format: {}", name)))
}

/// Known level names from a comma separated list; unknown names are ignored
pub fn parse_condition_levels(csv: &str) -> Vec<ConditionLevel> {
    let mut levels: Vec<ConditionLevel> = csv
        .split(',')
        .filter_map(|name| name.trim().parse().ok())
        .collect();
    levels.sort_by_key(|level| level.as_str());
    levels.dedup();
    levels
}

/// GET /api/condition/{jia_isu_uuid}
async fn get_isu_conditions(
    State(state): State<Arc<AppState>>,
    Path(jia_isu_uuid): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ConditionsQuery>,
) -> Result<Response, ApiError> {
    let user_id = state.user_id(&headers)?;

    let end_time = parse_unix_param("end_time", query.end_time.as_deref().unwrap_or(""))?;
    let levels = match query.condition_level.as_deref() {
        None | Some("") => return Err(ApiError::BadRequest("missing: condition_level".to_string())),
        Some(csv) => parse_condition_levels(csv),
    };
    if levels.is_empty() {
        return Err(ApiError::BadRequest("bad format: condition_level".to_string()));
    }
    let start_time = match query.start_time.as_deref() {
        None | Some("") => None,
        Some(value) => Some(parse_unix_param("start_time", value)?),
    };

    let device = state.owned_device(&jia_isu_uuid, &user_id).await?;
    let rows = state
        .store
        .select_conditions(
            &jia_isu_uuid,
            end_time,
            start_time,
            &levels,
            state.condition_page_limit,
        )
        .await?;

    let response: Vec<GetIsuConditionResponse> = rows
        .into_iter()
        .map(|row| GetIsuConditionResponse::from_row(row, &device.name))
        .collect();
    Ok(Json(response).into_response())
}

#[derive(Debug, Deserialize)]
struct GraphQuery {
    datetime: Option<String>,
}

/// GET /api/isu/{jia_isu_uuid}/graph
async fn get_isu_graph(
    State(state): State<Arc<AppState>>,
    Path(jia_isu_uuid): Path<String>,
    headers: HeaderMap,
    Query(query): Query<GraphQuery>,
) -> Result<Response, ApiError> {
    let user_id = state.user_id(&headers)?;

    let datetime = match query.datetime.as_deref() {
        None | Some("") => return Err(ApiError::BadRequest("missing: datetime".to_string())),
        Some(value) => parse_unix_param("datetime", value)?,
    };
    let day = graph_day(datetime)
        .ok_or_else(|| ApiError::BadRequest("bad format: datetime".to_string()))?;

    state.owned_device(&jia_isu_uuid, &user_id).await?;
    let graph = build_graph(&state.store, &jia_isu_uuid, day).await?;
    Ok(Json(graph).into_response())
}

/// GET /api/isu
async fn get_isu_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user_id = state.user_id(&headers)?;
    let devices = state.store.select_devices_for_user(&user_id).await?;

    let mut response = Vec::with_capacity(devices.len());
    for device in devices {
        let latest_isu_condition = state
            .store
            .latest_condition(&device.jia_isu_uuid)
            .await?
            .map(|row| GetIsuConditionResponse::from_row(row, &device.name));

        response.push(GetIsuListResponse {
            id: device.id,
            jia_isu_uuid: device.jia_isu_uuid,
            name: device.name,
            character: device.character,
            latest_isu_condition,
        });
    }
    Ok(Json(response).into_response())
}

/// GET /api/isu/{jia_isu_uuid}
async fn get_isu(
    State(state): State<Arc<AppState>>,
    Path(jia_isu_uuid): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user_id = state.user_id(&headers)?;
    let device = state.owned_device(&jia_isu_uuid, &user_id).await?;
    Ok(Json(device).into_response())
}

/// GET /api/trend
///
/// Serves the last published summary as is.
async fn get_trend(State(state): State<Arc<AppState>>) -> Response {
    let summary = state.trend.get();
    Json(&*summary).into_response()
}
