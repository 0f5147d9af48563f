use axum::Router;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::app::install::{InstallOutcome, InstallPrompt};
use crate::catalog::{FilterState, LoadStatus, QUICK_PICKS, filter_records};
use crate::offline::{FetchRequest, FetchResponse, WorkerState};
use crate::records::Record;
use crate::view::{self, CatalogView, Platform};

type ApiError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/api/catalog", get(list_catalog))
        .route("/api/catalog/reload", post(reload_catalog))
        .route("/api/view", get(render_view))
        .route("/api/filters", axum::routing::put(update_filters))
        .route("/api/filters/clear", post(clear_filters))
        .route("/api/filters/categories/:category", post(toggle_category))
        .route("/api/quick-picks/:index", post(apply_quick_pick))
        .route("/api/surprise", get(surprise))
        .route("/api/favorites", get(list_favorites))
        .route("/api/favorites/:id", post(toggle_favorite))
        .route("/api/install-prompt", post(offer_install_prompt))
        .route("/api/install", post(consume_install_prompt))
        .fallback(intercept)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CatalogQuery {
    #[serde(default)]
    q: String,
    /// Pipe-separated, like the record `category` column.
    #[serde(default)]
    categories: String,
    #[serde(default)]
    favorites_only: bool,
}

#[derive(Debug, Serialize)]
struct CatalogResponse {
    status: LoadStatus,
    message: String,
    total: usize,
    records: Vec<Record>,
}

async fn list_catalog(
    State(state): State<AppState>,
    Query(q): Query<CatalogQuery>,
) -> Json<CatalogResponse> {
    let filter = FilterState {
        query: q.q,
        active_categories: q
            .categories
            .split('|')
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect(),
        favorites_only: q.favorites_only,
    };

    let catalog = state.catalog.read().await;
    let records = filter_records(catalog.records(), &filter, catalog.favorites())
        .into_iter()
        .cloned()
        .collect();
    Json(CatalogResponse {
        status: catalog.status().clone(),
        message: catalog.status().message(),
        total: catalog.records().len(),
        records,
    })
}

async fn reload_catalog(State(state): State<AppState>) -> Result<Json<LoadStatus>, ApiError> {
    let loaded = crate::sheet::reload(&state.sheet, &state.catalog).await;
    let status = state.catalog.read().await.status().clone();
    if loaded {
        Ok(Json(status))
    } else {
        Err((StatusCode::BAD_GATEWAY, status.message()))
    }
}

async fn render_view(State(state): State<AppState>, headers: HeaderMap) -> Json<CatalogView> {
    let platform = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map_or(Platform::Other, Platform::from_user_agent);
    let snapshot = state.catalog.read().await.snapshot();
    Json(view::render(&snapshot, platform))
}

#[derive(Debug, Deserialize)]
struct FilterUpdate {
    query: Option<String>,
    favorites_only: Option<bool>,
}

async fn update_filters(
    State(state): State<AppState>,
    Json(update): Json<FilterUpdate>,
) -> Json<FilterState> {
    let mut catalog = state.catalog.write().await;
    if let Some(query) = update.query {
        catalog.set_query(query);
    }
    if let Some(favorites_only) = update.favorites_only {
        catalog.set_favorites_only(favorites_only);
    }
    Json(catalog.filter().clone())
}

async fn clear_filters(State(state): State<AppState>) -> Json<FilterState> {
    let mut catalog = state.catalog.write().await;
    catalog.clear_filters();
    Json(catalog.filter().clone())
}

async fn toggle_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Json<FilterState> {
    let mut catalog = state.catalog.write().await;
    catalog.toggle_category(&category);
    Json(catalog.filter().clone())
}

async fn apply_quick_pick(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<FilterState>, ApiError> {
    let pick = QUICK_PICKS
        .get(index)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no quick pick #{index}")))?;
    let mut catalog = state.catalog.write().await;
    catalog.apply_quick_pick(pick);
    Ok(Json(catalog.filter().clone()))
}

#[derive(Debug, Serialize)]
struct SurprisePick {
    id: String,
    anchor: String,
}

async fn surprise(State(state): State<AppState>) -> Result<Json<SurprisePick>, StatusCode> {
    let catalog = state.catalog.read().await;
    let record = catalog.surprise().ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(SurprisePick {
        id: record.id.clone(),
        anchor: format!("card-{}", record.id),
    }))
}

async fn list_favorites(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.catalog.read().await.favorites().to_vec())
}

#[derive(Debug, Serialize)]
struct FavoriteToggled {
    id: String,
    favorite: bool,
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FavoriteToggled>, ApiError> {
    let id = id.trim().to_owned();
    if id.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "id is required".to_string()));
    }
    let favorite = crate::favorites::toggle(&state.catalog, &state.favorites, &id).await;
    Ok(Json(FavoriteToggled { id, favorite }))
}

#[derive(Debug, Serialize)]
struct PromptOffered {
    prompt_id: uuid::Uuid,
    offered_at: chrono::DateTime<chrono::Utc>,
}

async fn offer_install_prompt(State(state): State<AppState>) -> Json<PromptOffered> {
    let prompt = InstallPrompt::offered();
    let offered_at = prompt.offered_at();
    let prompt_id = state.install_prompt.offer(prompt);
    Json(PromptOffered {
        prompt_id,
        offered_at,
    })
}

#[derive(Debug, Deserialize)]
struct InstallDecision {
    #[serde(default = "default_accepted")]
    accepted: bool,
}

fn default_accepted() -> bool {
    true
}

async fn consume_install_prompt(
    State(state): State<AppState>,
    Json(decision): Json<InstallDecision>,
) -> Result<Json<InstallOutcome>, ApiError> {
    let prompt = state.install_prompt.take().ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            "no install prompt is available".to_string(),
        )
    })?;
    Ok(Json(prompt.resolve(decision.accepted)))
}

async fn intercept(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n").into_response();
    }

    let url = state.worker.config().resolve(uri.path(), uri.query());
    let request = FetchRequest::new(method.as_str(), url);

    let result = match state.worker.state().await {
        WorkerState::Activated => state.worker.handle_fetch(&request).await,
        // Install failed; the app keeps working online without a cache.
        WorkerState::Redundant => state.network.fetch(&request).await,
        pending => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("offline worker is not active yet ({pending:?})\n"),
            )
                .into_response();
        }
    };

    match result {
        Ok(response) => into_http_response(response, method == Method::HEAD),
        Err(err) => {
            tracing::warn!(?err, url = %request.url, "no usable response");
            (StatusCode::BAD_GATEWAY, format!("{err:#}\n")).into_response()
        }
    }
}

fn into_http_response(fetched: FetchResponse, head_only: bool) -> Response {
    let status = StatusCode::from_u16(fetched.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = if head_only {
        Body::empty()
    } else {
        Body::from(fetched.body)
    };

    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    for (name, value) in fetched.headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) else {
            continue;
        };
        resp.headers_mut().append(name, value);
    }
    resp
}
